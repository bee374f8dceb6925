//! 워크플로우 설정
//!
//! [`WorkflowConfig`]는 하나의 워크플로우를 기술하는 불변 설정입니다:
//! 소스 스펙, 목적지 스펙, 순서 있는 단계 목록, 이름.
//!
//! 소스/싱크 종류는 설정의 `type` 필드에 대한 태그드 배리언트로
//! 결정됩니다 — 런타임 문자열 디스패치가 아니라 구성 시점에 구체
//! 어댑터가 선택됩니다.
//!
//! # 사용 예시 (TOML)
//! ```toml
//! name = "notable-events"
//!
//! [source]
//! type = "fs"
//! input_format = "csv"
//! input_path = "/data/notables.csv"
//! header = 0
//! required_cols = ["rule", "count"]
//! dtype = { rule = "str", count = "int" }
//!
//! [destination]
//! type = "fs"
//! output_format = "csv"
//! output_path = "/data/out.csv"
//!
//! [[stages]]
//! kind = "zscore"
//! column = "count"
//! window = 7
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use logsift_core::types::{Field, FieldType, Schema};

use crate::error::WorkflowError;

fn default_delimiter() -> String {
    ",".to_owned()
}

fn default_format() -> String {
    "csv".to_owned()
}

fn default_score_column() -> String {
    "zscore".to_owned()
}

/// 파서 행 실패 정책
///
/// 문법에 맞지 않는 행을 어떻게 처리할지 결정합니다.
/// 어느 쪽이든 실패는 집계됩니다 — 말없는 데이터 손실은 없습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Null로 채운 행을 내보내고 실패 플래그 컬럼으로 표시 (기본값)
    #[default]
    Flag,
    /// 행을 드롭하고 실패 카운터 증가
    Drop,
}

/// 워크플로우 설정 — 소스, 목적지, 단계 체인, 이름
///
/// 구성 시점에 검증되며 이후 변경되지 않습니다. 필수 필드는
/// 말없이 기본값으로 대체되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// 워크플로우 이름
    pub name: String,
    /// 소스 스펙
    pub source: SourceSpec,
    /// 목적지 스펙
    pub destination: SinkSpec,
    /// 순서 있는 단계 목록
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl WorkflowConfig {
    /// TOML 문자열에서 설정을 파싱하고 검증합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WorkflowError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| WorkflowError::config("workflow", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드하고 검증합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkflowError::config("workflow", format!("{}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.is_empty() {
            return Err(WorkflowError::config("name", "must not be empty"));
        }
        self.source.validate()?;
        self.destination.validate()?;
        for (i, stage) in self.stages.iter().enumerate() {
            stage
                .validate()
                .map_err(|e| match e {
                    WorkflowError::Config { field, reason } => WorkflowError::Config {
                        field: format!("stages[{i}].{field}"),
                        reason,
                    },
                    other => other,
                })?;
        }
        Ok(())
    }
}

/// 소스 스펙 — `type` 필드로 태그되는 배리언트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    /// 파일 시스템 소스 (유한, 배치 실행)
    Fs(FsSourceSpec),
    /// 메시지 스트림 소스 (정지 요청까지 무한)
    Stream(StreamSourceSpec),
}

impl SourceSpec {
    /// 소스 식별자 문자열을 반환합니다 (로깅/에러용).
    pub fn origin(&self) -> String {
        match self {
            Self::Fs(spec) => format!("fs:{}", spec.input_path),
            Self::Stream(spec) => format!("stream:{}", spec.topic),
        }
    }

    /// 스트림 소스 여부를 반환합니다.
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        match self {
            Self::Fs(spec) => spec.validate(),
            Self::Stream(spec) => spec.validate(),
        }
    }
}

/// 스키마/엄격성 관련 공유 필드의 검증 로직
fn validate_schema_fields(
    prefix: &str,
    schema: &[String],
    dtype: &BTreeMap<String, FieldType>,
    required_cols: &[String],
) -> Result<(), WorkflowError> {
    for name in dtype.keys() {
        if !schema.is_empty() && !schema.iter().any(|c| c == name) {
            return Err(WorkflowError::config(
                format!("{prefix}.dtype"),
                format!("dtype references unknown column '{name}'"),
            ));
        }
    }
    for name in required_cols {
        if !schema.is_empty() && !schema.iter().any(|c| c == name) {
            return Err(WorkflowError::config(
                format!("{prefix}.required_cols"),
                format!("required column '{name}' is not in the schema"),
            ));
        }
    }
    Ok(())
}

/// 스키마 이름 목록 + dtype 매핑으로 [`Schema`]를 구성합니다.
fn build_schema(names: &[String], dtype: &BTreeMap<String, FieldType>) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| Field::new(n, dtype.get(n).copied().unwrap_or_default()))
            .collect(),
    )
}

/// 파일 시스템 소스 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsSourceSpec {
    /// 입력 형식 (delimited 텍스트가 기준선: "csv", "tsv")
    #[serde(default = "default_format")]
    pub input_format: String,
    /// 입력 파일 경로
    pub input_path: String,
    /// 필드 구분자 (단일 문자)
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// 컬럼 이름 목록 (비어 있으면 헤더 행에서 유도)
    #[serde(default)]
    pub schema: Vec<String>,
    /// 컬럼별 의미 타입 (지정 없는 컬럼은 str)
    #[serde(default)]
    pub dtype: BTreeMap<String, FieldType>,
    /// 값이 반드시 있어야 하는 컬럼 목록
    #[serde(default)]
    pub required_cols: Vec<String>,
    /// 헤더 행 인덱스 (없으면 헤더 없음)
    pub header: Option<usize>,
    /// 엄격 모드: 위반 행이 있으면 배치 전체 실패 (기본: 드롭 후 집계)
    #[serde(default)]
    pub strict: bool,
    /// 배치당 행 수 (없으면 엔진 기본값)
    pub batch_rows: Option<usize>,
}

impl FsSourceSpec {
    /// 구분자를 단일 바이트로 반환합니다.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// 선언된 스키마를 반환합니다 (비어 있으면 None — 헤더에서 유도).
    pub fn declared_schema(&self) -> Option<Schema> {
        if self.schema.is_empty() {
            None
        } else {
            Some(build_schema(&self.schema, &self.dtype))
        }
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if self.input_path.is_empty() {
            return Err(WorkflowError::config("source.input_path", "must not be empty"));
        }
        let valid_formats = ["csv", "tsv"];
        if !valid_formats.contains(&self.input_format.as_str()) {
            return Err(WorkflowError::config(
                "source.input_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }
        if self.delimiter.len() != 1 {
            return Err(WorkflowError::config(
                "source.delimiter",
                "must be a single character",
            ));
        }
        if self.schema.is_empty() && self.header.is_none() {
            return Err(WorkflowError::config(
                "source.schema",
                "either a schema or a header row is required",
            ));
        }
        if let Some(batch_rows) = self.batch_rows {
            if batch_rows == 0 {
                return Err(WorkflowError::config("source.batch_rows", "must be greater than 0"));
            }
        }
        validate_schema_fields("source", &self.schema, &self.dtype, &self.required_cols)
    }
}

/// 메시지 스트림 소스 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSourceSpec {
    /// 구독할 토픽 이름
    pub topic: String,
    /// 메시지 페이로드 형식 (구분자 레코드 한 건)
    #[serde(default = "default_format")]
    pub input_format: String,
    /// 필드 구분자 (단일 문자)
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// 컬럼 이름 목록 (스트림 메시지에는 헤더가 없으므로 필수)
    pub schema: Vec<String>,
    /// 컬럼별 의미 타입
    #[serde(default)]
    pub dtype: BTreeMap<String, FieldType>,
    /// 값이 반드시 있어야 하는 컬럼 목록
    #[serde(default)]
    pub required_cols: Vec<String>,
    /// 엄격 모드
    #[serde(default)]
    pub strict: bool,
    /// poll 타임아웃 (밀리초, 없으면 엔진 기본값)
    pub poll_timeout_ms: Option<u64>,
    /// 배치당 최대 행 수 (없으면 엔진 기본값)
    pub batch_rows: Option<usize>,
}

impl StreamSourceSpec {
    /// 구분자를 단일 바이트로 반환합니다.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// 선언된 스키마를 반환합니다.
    pub fn declared_schema(&self) -> Schema {
        build_schema(&self.schema, &self.dtype)
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if self.topic.is_empty() {
            return Err(WorkflowError::config("source.topic", "must not be empty"));
        }
        if self.schema.is_empty() {
            return Err(WorkflowError::config(
                "source.schema",
                "stream sources require an explicit schema",
            ));
        }
        if self.delimiter.len() != 1 {
            return Err(WorkflowError::config(
                "source.delimiter",
                "must be a single character",
            ));
        }
        validate_schema_fields("source", &self.schema, &self.dtype, &self.required_cols)
    }
}

/// 싱크 스펙 — `type` 필드로 태그되는 배리언트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkSpec {
    /// 파일 시스템 싱크
    Fs(FsSinkSpec),
    /// 메시지 스트림 싱크
    Stream(StreamSinkSpec),
}

impl SinkSpec {
    /// 싱크 식별자 문자열을 반환합니다 (로깅/에러용).
    pub fn destination(&self) -> String {
        match self {
            Self::Fs(spec) => format!("fs:{}", spec.output_path),
            Self::Stream(spec) => format!("stream:{}", spec.topic),
        }
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        match self {
            Self::Fs(spec) => {
                if spec.output_path.is_empty() {
                    return Err(WorkflowError::config(
                        "destination.output_path",
                        "must not be empty",
                    ));
                }
                if spec.delimiter.len() != 1 {
                    return Err(WorkflowError::config(
                        "destination.delimiter",
                        "must be a single character",
                    ));
                }
                Ok(())
            }
            Self::Stream(spec) => {
                if spec.topic.is_empty() {
                    return Err(WorkflowError::config("destination.topic", "must not be empty"));
                }
                Ok(())
            }
        }
    }
}

/// 파일 시스템 싱크 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsSinkSpec {
    /// 출력 형식
    #[serde(default = "default_format")]
    pub output_format: String,
    /// 출력 파일 경로
    pub output_path: String,
    /// 필드 구분자
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl FsSinkSpec {
    /// 구분자를 단일 바이트로 반환합니다.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

/// 메시지 스트림 싱크 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSinkSpec {
    /// 발행할 토픽 이름
    pub topic: String,
    /// 메시지 페이로드 형식
    #[serde(default = "default_format")]
    pub output_format: String,
    /// 필드 구분자
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

/// 단계 스펙 — `kind` 필드로 태그되는 배리언트
///
/// 커스텀 변환은 TOML로 기술할 수 없으며, 빌더를 통해 코드로 추가합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageSpec {
    /// 파서 단계: 원시 컬럼을 구조화 스키마로 변환
    Parse {
        /// 파서 형식 이름 (내장 형식 또는 레지스트리의 `format_name`)
        format: String,
        /// 파싱할 원시 컬럼 이름
        column: String,
        /// 행 실패 정책
        #[serde(default)]
        on_failure: FailurePolicy,
        /// 추출할 대상 필드 목록 (내장 형식에 필수, 커스텀 파서는 자체 선언)
        #[serde(default)]
        schema: Vec<String>,
        /// 대상 필드별 의미 타입
        #[serde(default)]
        dtype: BTreeMap<String, FieldType>,
    },
    /// 롤링 z-score 컬럼 부여
    Zscore {
        /// 점수를 계산할 숫자 컬럼
        column: String,
        /// 윈도우 크기 (>= 2)
        window: usize,
        /// 출력 컬럼 이름
        #[serde(default = "default_score_column")]
        output_column: String,
    },
    /// 컬럼 선택 (순서 재지정 포함)
    Select {
        /// 남길 컬럼 목록
        columns: Vec<String>,
    },
    /// 컬럼 기준 정렬 (선언된 재정렬 연산)
    Sort {
        /// 정렬 기준 컬럼
        column: String,
    },
}

impl StageSpec {
    fn validate(&self) -> Result<(), WorkflowError> {
        match self {
            Self::Parse {
                format,
                column,
                schema,
                dtype,
                ..
            } => {
                if format.is_empty() {
                    return Err(WorkflowError::config("format", "must not be empty"));
                }
                if column.is_empty() {
                    return Err(WorkflowError::config("column", "must not be empty"));
                }
                validate_schema_fields("parse", schema, dtype, &[])
            }
            Self::Zscore { column, window, .. } => {
                if column.is_empty() {
                    return Err(WorkflowError::config("column", "must not be empty"));
                }
                if *window < 2 {
                    return Err(WorkflowError::config(
                        "window",
                        format!("must be >= 2, got {window}"),
                    ));
                }
                Ok(())
            }
            Self::Select { columns } => {
                if columns.is_empty() {
                    return Err(WorkflowError::config("columns", "must not be empty"));
                }
                Ok(())
            }
            Self::Sort { column } => {
                if column.is_empty() {
                    return Err(WorkflowError::config("column", "must not be empty"));
                }
                Ok(())
            }
        }
    }
}
