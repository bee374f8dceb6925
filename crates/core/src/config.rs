//! 설정 관리 — logsift.toml 파싱 및 런타임 설정
//!
//! [`LogsiftConfig`]는 엔진 전역 설정을 담는 최상위 구조체입니다.
//! 개별 워크플로우 정의는 워크플로우 크레이트의 `WorkflowConfig`가
//! 별도 파일로 다룹니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`LOGSIFT_GENERAL_LOG_LEVEL=debug` 형식)
//! 2. 설정 파일 (`logsift.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsift_core::error::LogsiftError> {
//! use logsift_core::config::LogsiftConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogsiftConfig::load("logsift.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogsiftConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogsiftError};

/// Logsift 통합 설정
///
/// `logsift.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsiftConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 엔진 공통 설정
    #[serde(default)]
    pub engine: EngineConfig,
}

impl LogsiftConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogsiftError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogsiftError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogsiftError> {
        toml::from_str(toml_str).map_err(|e| {
            LogsiftError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIFT_{SECTION}_{FIELD}`
    /// 예: `LOGSIFT_ENGINE_MAX_BATCH_ROWS=5000`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSIFT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIFT_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "LOGSIFT_GENERAL_DATA_DIR");

        // Engine
        override_usize(
            &mut self.engine.max_batch_rows,
            "LOGSIFT_ENGINE_MAX_BATCH_ROWS",
        );
        override_u64(
            &mut self.engine.poll_timeout_ms,
            "LOGSIFT_ENGINE_POLL_TIMEOUT_MS",
        );
        override_u32(
            &mut self.engine.sink_max_attempts,
            "LOGSIFT_ENGINE_SINK_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.engine.sink_backoff_base_ms,
            "LOGSIFT_ENGINE_SINK_BACKOFF_BASE_MS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogsiftError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        const MAX_BATCH_ROWS: usize = 1_000_000;
        if self.engine.max_batch_rows == 0 || self.engine.max_batch_rows > MAX_BATCH_ROWS {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_batch_rows".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_ROWS}"),
            }
            .into());
        }

        if self.engine.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.poll_timeout_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.engine.sink_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.sink_max_attempts".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/logsift".to_owned(),
        }
    }
}

/// 엔진 공통 설정
///
/// 개별 워크플로우 정의에 없는 값의 기본치를 제공합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 배치당 최대 행 수
    pub max_batch_rows: usize,
    /// 스트림 소스 poll 타임아웃 (밀리초)
    pub poll_timeout_ms: u64,
    /// 싱크 쓰기 최대 시도 횟수 (재시도 포함)
    pub sink_max_attempts: u32,
    /// 싱크 재시도 백오프 기본값 (밀리초, 시도마다 2배)
    pub sink_backoff_base_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_rows: 1024,
            poll_timeout_ms: 500,
            sink_max_attempts: 3,
            sink_backoff_base_ms: 50,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogsiftConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.engine.max_batch_rows, 1024);
        assert_eq!(config.engine.sink_max_attempts, 3);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = LogsiftConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LogsiftConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.engine.poll_timeout_ms, 500);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[engine]
max_batch_rows = 5000
"#;
        let config = LogsiftConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.engine.max_batch_rows, 5000);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = LogsiftConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LogsiftError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LogsiftConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LogsiftConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_batch_rows() {
        let mut config = LogsiftConfig::default();
        config.engine.max_batch_rows = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_batch_rows"));
    }

    #[test]
    fn validate_rejects_zero_sink_attempts() {
        let mut config = LogsiftConfig::default();
        config.engine.sink_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_string_applies() {
        let mut config = LogsiftConfig::default();
        // SAFETY: serial 테스트로 단일 스레드 실행이 보장되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("LOGSIFT_GENERAL_LOG_LEVEL", "warn") };
        config.apply_env_overrides();
        assert_eq!(config.general.log_level, "warn");
        unsafe { std::env::remove_var("LOGSIFT_GENERAL_LOG_LEVEL") };
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut config = LogsiftConfig::default();
        // SAFETY: serial 테스트로 단일 스레드 실행이 보장되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("LOGSIFT_ENGINE_MAX_BATCH_ROWS", "not-a-number") };
        config.apply_env_overrides();
        assert_eq!(config.engine.max_batch_rows, 1024); // 원래 값 유지
        unsafe { std::env::remove_var("LOGSIFT_ENGINE_MAX_BATCH_ROWS") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogsiftConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogsiftConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.engine.max_batch_rows, parsed.engine.max_batch_rows);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = LogsiftConfig::from_file("/nonexistent/path/logsift.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LogsiftError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
