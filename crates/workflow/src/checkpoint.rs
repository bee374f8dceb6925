//! 체크포인트 — 마지막으로 완전히 처리되어 싱크까지 반영된 소스 위치
//!
//! 체크포인트는 배치가 싱크 쓰기까지 성공한 뒤에만 전진합니다.
//! 치명적 실패 시 실패한 배치 이전 위치가 유지되므로, 재시작한
//! 워크플로우는 마지막 정상 지점부터 재개할 수 있습니다.

use serde::{Deserialize, Serialize};

/// 소스 진행 위치 마커
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 싱크까지 반영된 소스 행 수 (소스 오프셋)
    pub rows: u64,
    /// 완료된 배치 수 (배치 시퀀스)
    pub batches: u64,
}

impl Checkpoint {
    /// 시작 지점 체크포인트를 생성합니다.
    pub fn start() -> Self {
        Self::default()
    }

    /// 배치 완료 후 체크포인트를 전진시킵니다.
    pub fn advance(&mut self, batch_rows: u64) {
        self.rows += batch_rows;
        self.batches += 1;
    }

    /// 아직 아무 배치도 완료되지 않았는지 확인합니다.
    pub fn is_start(&self) -> bool {
        self.batches == 0
    }
}
