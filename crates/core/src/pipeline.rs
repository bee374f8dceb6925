//! 파이프라인 trait — 모듈 확장 포인트 정의

use std::time::Duration;

use bytes::Bytes;

use crate::error::{LogsiftError, ParseError, WorkflowFault};
use crate::frame::Frame;
use crate::types::{RawRecord, Schema};

/// 파서 한 번 호출의 결과
///
/// 정책상 드롭된 행 수를 함께 반환하여 행 단위 손실이 항상 집계되도록
/// 합니다 (출력 행 수 + 드롭 행 수 == 입력 행 수).
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// 구조화된 결과 프레임
    pub frame: Frame,
    /// 문법 불일치로 드롭된 행 수 (플래그 정책이면 항상 0)
    pub dropped_rows: u64,
    /// 문법 불일치가 발생한 행 수 (드롭 여부와 무관)
    pub failed_rows: u64,
}

/// 레코드 파서 trait
///
/// 원시 레코드 배치의 한 컬럼을 구조화 스키마로 변환합니다.
/// 구현은 호출 간 공유 가변 상태가 없어야 하며, 서로 다른 배치에 대해
/// 반복/동시 호출이 안전해야 합니다.
pub trait RecordParser: Send + Sync {
    /// 지원하는 형식 이름 (설정의 `format` 값과 매칭)
    fn format_name(&self) -> &str;

    /// 파서가 생성하는 출력 스키마
    fn schema(&self) -> Schema;

    /// 배치의 `column` 컬럼을 파싱하여 구조화 프레임을 생성합니다.
    ///
    /// 행 단위 실패는 파서의 실패 정책에 따라 플래그 또는 드롭으로
    /// 처리되고 [`ParseOutcome`]에 집계됩니다. 반환되는 `Err`는
    /// 배치 전체의 실패이며 워크플로우를 중단시킵니다.
    fn parse(&self, batch: &Frame, column: &str) -> Result<ParseOutcome, ParseError>;
}

/// 레코드 변환 단계 trait
///
/// 파서가 아닌 일반 변환 단계 (필터, 점수 부여 등)가 구현합니다.
pub trait Transform: Send {
    /// 단계 이름 (로깅 및 집계 식별용)
    fn name(&self) -> &str;

    /// 이 단계가 행 순서를 바꾸는지 여부
    ///
    /// 재정렬은 선언된 연산이어야 합니다. 기본값은 false이며,
    /// 정렬을 수행하는 단계만 true를 반환합니다.
    fn reorders(&self) -> bool {
        false
    }

    /// 배치를 변환합니다.
    fn apply(&mut self, batch: Frame) -> Result<Frame, LogsiftError>;
}

/// 메시징/스트림 클라이언트 trait
///
/// 스트림 소스/싱크 어댑터가 사용하는 추상 엔드포인트입니다.
/// 구체 브로커 클라이언트 (Kafka 등)는 이 trait 뒤에 숨겨지며,
/// 엔진은 poll/publish 계약만 압니다.
#[async_trait::async_trait]
pub trait MessageClient: Send {
    /// 최대 `timeout` 동안 대기하며 도착한 메시지를 반환합니다.
    ///
    /// 타임아웃은 에러가 아니라 빈 Vec입니다.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawRecord>, WorkflowFault>;

    /// 토픽에 메시지 한 건을 발행합니다.
    ///
    /// 반환이 곧 전달 확인(ack)입니다. 일시 장애는 에러로 표면화되며
    /// 재시도는 호출자(싱크 어댑터)의 책임입니다.
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), WorkflowFault>;
}
