//! 워크플로우 에러 타입
//!
//! [`WorkflowError`]는 워크플로우 엔진 내부에서 발생하는 모든 에러를
//! 표현합니다. `From<WorkflowError> for LogsiftError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logsift_core::error::{ConfigError, FrameError, LogsiftError, ParseError, WorkflowFault};

/// 워크플로우 도메인 에러
///
/// 설정, 소스/싱크 I/O, 파싱, 통계 등 엔진 내부의 모든 에러 상황을
/// 포괄합니다. 행 단위 파싱 실패는 에러가 아니라 카운터로 집계되며,
/// 여기의 `ParseBatch`는 배치 전체를 중단시키는 치명적 실패입니다.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// 워크플로우 설정 에러 (구성 시점에 치명적)
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 소스 어댑터 열기/읽기 실패
    #[error("source error: {origin}: {reason}")]
    Source {
        /// 소스 식별자 (경로 또는 토픽)
        origin: String,
        /// 에러 사유
        reason: String,
    },

    /// 배치 수준 파싱 실패 (치명적, 체크포인트 비전진)
    #[error("batch parse error: {format}: {reason}")]
    ParseBatch {
        /// 파서 형식
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// 싱크 쓰기/발행 실패 (재시도 소진 후)
    #[error("sink error: {destination}: failed after {attempts} attempts: {reason}")]
    Sink {
        /// 싱크 식별자 (경로 또는 토픽)
        destination: String,
        /// 소진된 시도 횟수
        attempts: u32,
        /// 마지막 실패 사유
        reason: String,
    },

    /// 통계 연산 거부 (윈도우 < 2, 빈 시퀀스 등)
    #[error("statistics error: {0}")]
    Statistics(String),

    /// 실행 상태 위반 (이중 실행, 미시작 정지 등)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 테이블 프레임 연산 에러
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// 설정 에러를 생성하는 축약 생성자.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ParseError> for WorkflowError {
    fn from(err: ParseError) -> Self {
        let format = match &err {
            ParseError::UnsupportedFormat(f) => f.clone(),
            _ => "unknown".to_owned(),
        };
        Self::ParseBatch {
            format,
            reason: err.to_string(),
        }
    }
}

impl From<WorkflowError> for LogsiftError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Config { field, reason } => {
                LogsiftError::Config(ConfigError::InvalidValue { field, reason })
            }
            WorkflowError::Frame(e) => LogsiftError::Frame(e),
            WorkflowError::Io(e) => LogsiftError::Io(e),
            WorkflowError::Source { origin, reason } => {
                LogsiftError::Workflow(WorkflowFault::Source(format!("{origin}: {reason}")))
            }
            WorkflowError::Sink {
                destination,
                attempts,
                reason,
            } => LogsiftError::Workflow(WorkflowFault::Sink(format!(
                "{destination}: after {attempts} attempts: {reason}"
            ))),
            WorkflowError::Channel(reason) => {
                LogsiftError::Workflow(WorkflowFault::Channel(reason))
            }
            other => LogsiftError::Workflow(WorkflowFault::InvalidState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_display() {
        let err = WorkflowError::Sink {
            destination: "stream:alerts-out".to_owned(),
            attempts: 3,
            reason: "broker unavailable".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alerts-out"));
        assert!(msg.contains('3'));
        assert!(msg.contains("broker unavailable"));
    }

    #[test]
    fn config_error_converts_to_core() {
        let err = WorkflowError::config("source.input_path", "must not be empty");
        let core_err: LogsiftError = err.into();
        assert!(matches!(core_err, LogsiftError::Config(_)));
    }

    #[test]
    fn source_error_converts_to_workflow_fault() {
        let err = WorkflowError::Source {
            origin: "fs:/data/in.csv".to_owned(),
            reason: "no such file".to_owned(),
        };
        let core_err: LogsiftError = err.into();
        assert!(matches!(
            core_err,
            LogsiftError::Workflow(WorkflowFault::Source(_))
        ));
    }

    #[test]
    fn parse_error_converts_to_batch_failure() {
        let err: WorkflowError = ParseError::UnsupportedFormat("xml".to_owned()).into();
        assert!(matches!(err, WorkflowError::ParseBatch { .. }));
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn statistics_error_display() {
        let err = WorkflowError::Statistics("window size must be >= 2, got 1".to_owned());
        assert!(err.to_string().contains(">= 2"));
    }
}
