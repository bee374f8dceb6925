//! 에러 타입 — 도메인별 에러 정의

/// Logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogsiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 테이블 프레임 연산 에러
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// 워크플로우 처리 에러
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowFault),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 테이블 프레임 연산 에러
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// 존재하지 않는 컬럼 참조
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// 스키마와 행 길이 불일치
    #[error("row width mismatch: expected {expected} values, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    /// 값 타입 변환 실패
    #[error("type mismatch in column '{column}': {reason}")]
    TypeMismatch { column: String, reason: String },

    /// 구분자 형식 파일 읽기/쓰기 실패
    #[error("delimited codec error: {0}")]
    Codec(String),

    /// 병합 대상 프레임 간 키 불일치
    #[error("join error: {0}")]
    Join(String),
}

/// 워크플로우 처리 에러 (모듈 경계용 축약형)
///
/// 워크플로우 크레이트 내부의 세분화된 에러는 이 타입으로 변환되어
/// 상위 레이어로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowFault {
    /// 소스 어댑터 열기/읽기 실패
    #[error("source failed: {0}")]
    Source(String),

    /// 싱크 어댑터 쓰기 실패
    #[error("sink failed: {0}")]
    Sink(String),

    /// 실행 상태 위반 (이중 시작, 미시작 정지 등)
    #[error("invalid run state: {0}")]
    InvalidState(String),

    /// 채널 통신 실패
    #[error("channel failed: {0}")]
    Channel(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 지원하지 않는 형식
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 파싱 실패
    #[error("parse failed at row {row}: {reason}")]
    Failed { row: usize, reason: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = LogsiftError::Config(ConfigError::InvalidValue {
            field: "source.batch_size".to_owned(),
            reason: "must be greater than 0".to_owned(),
        });
        let msg = err.to_string();
        assert!(msg.contains("source.batch_size"));
        assert!(msg.contains("greater than 0"));
    }

    #[test]
    fn frame_error_display() {
        let err = FrameError::WidthMismatch {
            expected: 3,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LogsiftError = io.into();
        assert!(matches!(err, LogsiftError::Io(_)));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::Failed {
            row: 17,
            reason: "not valid json".to_owned(),
        };
        assert!(err.to_string().contains("17"));
    }
}
