//! 소스 어댑터 — 원시 입력을 표준 배치로 변환
//!
//! 소스 종류는 설정의 태그드 배리언트로 구성 시점에 결정되며,
//! [`SourceAdapter`]는 그 구체 어댑터들의 열거 디스패치입니다.
//! 엔진은 종류와 무관하게 같은 계약을 사용합니다:
//!
//! - `open()` → 입력을 준비하고 체크포인트 위치로 이동
//! - `next_batch()` → 다음 배치 (`None` = 소진, 스트림은 정지 전까지 `Some`)
//! - `close()` → 자원 반납
//!
//! 행 유효성 정책 (required_cols, dtype 강제, strict)은 여기서
//! 적용됩니다. 코덱은 관용적이고, 어댑터가 엄격성을 결정합니다.

pub mod file;
pub mod stream;

pub use file::FileSource;
pub use stream::StreamSource;

use logsift_core::frame::Frame;
use logsift_core::types::Schema;

use crate::error::WorkflowError;

/// 소스가 내보내는 표준 배치
///
/// 거부 행 수는 배치별로 집계됩니다 — 말없는 손실은 없습니다.
#[derive(Debug)]
pub struct SourceBatch {
    /// 표준 스키마로 변환된 행들
    pub frame: Frame,
    /// 유효성 위반으로 드롭된 행 수 (strict 모드에서는 항상 0)
    pub rejected_rows: u64,
}

/// 소스 어댑터 열거 디스패치
pub enum SourceAdapter {
    /// 파일 시스템 소스 (유한)
    File(FileSource),
    /// 메시지 스트림 소스 (무한)
    Stream(StreamSource),
}

impl SourceAdapter {
    /// 입력을 준비합니다. 파일 소스는 여기서 전체 파일을 읽고
    /// 체크포인트 위치까지 이동합니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        match self {
            Self::File(source) => source.open().await,
            Self::Stream(source) => source.open().await,
        }
    }

    /// 다음 배치를 가져옵니다.
    ///
    /// `None`은 소스 소진(파일 끝)을 의미합니다. 스트림 소스는 소진되지
    /// 않으며, poll 타임아웃 시 빈 프레임 배치를 반환합니다.
    pub async fn next_batch(&mut self) -> Result<Option<SourceBatch>, WorkflowError> {
        match self {
            Self::File(source) => source.next_batch().await,
            Self::Stream(source) => source.next_batch().await,
        }
    }

    /// 소스를 닫습니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        match self {
            Self::File(source) => source.close().await,
            Self::Stream(source) => source.close().await,
        }
    }

    /// 소스 식별자를 반환합니다 (로깅/에러용).
    pub fn origin(&self) -> String {
        match self {
            Self::File(source) => source.origin(),
            Self::Stream(source) => source.origin(),
        }
    }
}

/// required_cols 위반 행 인덱스를 수집합니다.
///
/// 위반 = 필수 컬럼의 값이 `Null`인 행.
pub(crate) fn required_violations(
    frame: &Frame,
    schema: &Schema,
    required_cols: &[String],
) -> Result<Vec<usize>, WorkflowError> {
    let mut indices = Vec::new();
    for name in required_cols {
        let idx = schema.index_of(name).ok_or_else(|| {
            WorkflowError::config("required_cols", format!("unknown column '{name}'"))
        })?;
        for (row_idx, row) in frame.rows().iter().enumerate() {
            if row[idx].is_null() && !indices.contains(&row_idx) {
                indices.push(row_idx);
            }
        }
    }
    indices.sort_unstable();
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_core::types::Value;

    #[test]
    fn required_violations_finds_null_cells() {
        let schema = Schema::all_str(&["rule", "count"]);
        let frame = Frame::from_rows(
            schema.clone(),
            vec![
                vec![Value::Str("a".to_owned()), Value::Str("1".to_owned())],
                vec![Value::Null, Value::Str("2".to_owned())],
                vec![Value::Str("c".to_owned()), Value::Null],
            ],
        )
        .unwrap();

        let violations =
            required_violations(&frame, &schema, &["rule".to_owned(), "count".to_owned()])
                .unwrap();
        assert_eq!(violations, vec![1, 2]);

        let none = required_violations(&frame, &schema, &[]).unwrap();
        assert!(none.is_empty());
    }
}
