//! 단계 체인 — 파서 단계와 변환 단계의 실행 단위
//!
//! 단계는 배치마다 선언된 순서대로 적용됩니다. 행 순서는 정렬처럼
//! 재정렬을 선언한 단계를 제외하면 유지됩니다. 각 단계는 행 수지
//! (입력/출력/드롭)를 집계하므로, 행이 어디서 사라졌는지 항상 추적할
//! 수 있습니다.

use logsift_core::metrics::{
    LABEL_PARSER_FORMAT, LABEL_STAGE, WORKFLOW_PARSE_FAILURES_TOTAL, WORKFLOW_ROWS_DROPPED_TOTAL,
};
use logsift_core::frame::Frame;
use logsift_core::pipeline::{RecordParser, Transform};
use logsift_core::types::{Field, FieldType};

use crate::config::{StageSpec, FailurePolicy};
use crate::error::WorkflowError;
use crate::parser::{JsonRecordParser, KvRecordParser, ParserRegistry};
use crate::stats::RollingScoreStage;

/// 단계별 행 수지
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// 단계에 들어온 행 수
    pub rows_in: u64,
    /// 단계가 내보낸 행 수
    pub rows_out: u64,
    /// 단계에서 드롭된 행 수
    pub rows_dropped: u64,
    /// 행 단위 파싱 실패 수 (파서 단계만)
    pub parse_failures: u64,
}

/// 실행 가능한 단계
pub enum Stage {
    /// 원시 컬럼을 구조화 스키마로 변환하는 파서 단계
    Parse {
        /// 형식별 파서
        parser: Box<dyn RecordParser>,
        /// 파싱할 원시 컬럼
        column: String,
    },
    /// 프레임 변환 단계
    Transform(Box<dyn Transform>),
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { parser, column } => f
                .debug_struct("Parse")
                .field("parser", &parser.format_name())
                .field("column", column)
                .finish(),
            Self::Transform(transform) => {
                f.debug_tuple("Transform").field(&transform.name()).finish()
            }
        }
    }
}

impl Stage {
    /// 단계 이름을 반환합니다 (로깅/수지 집계용).
    pub fn name(&self) -> &str {
        match self {
            Self::Parse { parser, .. } => parser.format_name(),
            Self::Transform(transform) => transform.name(),
        }
    }

    /// 이 단계가 행 순서를 바꿀 수 있는지 반환합니다.
    pub fn reorders(&self) -> bool {
        match self {
            Self::Parse { .. } => false,
            Self::Transform(transform) => transform.reorders(),
        }
    }

    /// 배치에 단계를 적용하고 행 수지를 집계합니다.
    pub fn apply(&mut self, frame: Frame, stats: &mut StageStats) -> Result<Frame, WorkflowError> {
        stats.rows_in += frame.num_rows() as u64;
        let out = match self {
            Self::Parse { parser, column } => {
                let outcome = parser.parse(&frame, column)?;
                stats.rows_dropped += outcome.dropped_rows;
                stats.parse_failures += outcome.failed_rows;
                if outcome.failed_rows > 0 {
                    metrics::counter!(
                        WORKFLOW_PARSE_FAILURES_TOTAL,
                        LABEL_PARSER_FORMAT => parser.format_name().to_owned()
                    )
                    .increment(outcome.failed_rows);
                }
                if outcome.dropped_rows > 0 {
                    metrics::counter!(
                        WORKFLOW_ROWS_DROPPED_TOTAL,
                        LABEL_STAGE => parser.format_name().to_owned()
                    )
                    .increment(outcome.dropped_rows);
                }
                outcome.frame
            }
            Self::Transform(transform) => {
                let rows_before = frame.num_rows() as u64;
                let out = transform.apply(frame).map_err(|e| {
                    WorkflowError::InvalidState(format!(
                        "stage '{}' failed: {e}",
                        transform.name()
                    ))
                })?;
                let rows_after = out.num_rows() as u64;
                if rows_after < rows_before {
                    let dropped = rows_before - rows_after;
                    stats.rows_dropped += dropped;
                    metrics::counter!(
                        WORKFLOW_ROWS_DROPPED_TOTAL,
                        LABEL_STAGE => transform.name().to_owned()
                    )
                    .increment(dropped);
                }
                out
            }
        };
        stats.rows_out += out.num_rows() as u64;
        Ok(out)
    }
}

/// 컬럼 선택 단계
pub struct SelectStage {
    columns: Vec<String>,
}

impl SelectStage {
    /// 남길 컬럼 목록으로 단계를 생성합니다.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl Transform for SelectStage {
    fn name(&self) -> &str {
        "select"
    }

    fn apply(&mut self, frame: Frame) -> Result<Frame, logsift_core::LogsiftError> {
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        Ok(frame.select(&names)?)
    }
}

/// 컬럼 기준 정렬 단계 — 행 순서 재지정을 선언합니다.
pub struct SortStage {
    column: String,
}

impl SortStage {
    /// 정렬 기준 컬럼으로 단계를 생성합니다.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Transform for SortStage {
    fn name(&self) -> &str {
        "sort"
    }

    fn reorders(&self) -> bool {
        true
    }

    fn apply(&mut self, frame: Frame) -> Result<Frame, logsift_core::LogsiftError> {
        Ok(frame.sort_by(&self.column)?)
    }
}

/// 단계 스펙 목록을 실행 가능한 단계 체인으로 구성합니다.
///
/// 내장 형식(json, kv)의 파서는 스펙의 대상 필드로 여기서 만들어지고,
/// 그 외 형식은 레지스트리에서 꺼냅니다. 매칭되는 파서가 없으면 구성이
/// 실패합니다.
pub fn build_stages(
    specs: &[StageSpec],
    registry: &mut ParserRegistry,
) -> Result<Vec<Stage>, WorkflowError> {
    let mut stages = Vec::with_capacity(specs.len());
    for spec in specs {
        stages.push(build_stage(spec, registry)?);
    }
    Ok(stages)
}

fn build_stage(spec: &StageSpec, registry: &mut ParserRegistry) -> Result<Stage, WorkflowError> {
    match spec {
        StageSpec::Parse {
            format,
            column,
            on_failure,
            schema,
            dtype,
        } => {
            let parser = build_parser(format, *on_failure, schema, dtype, registry)?;
            Ok(Stage::Parse {
                parser,
                column: column.clone(),
            })
        }
        StageSpec::Zscore {
            column,
            window,
            output_column,
        } => {
            let stage = RollingScoreStage::new(column.clone(), *window, output_column.clone())?;
            Ok(Stage::Transform(Box::new(stage)))
        }
        StageSpec::Select { columns } => {
            Ok(Stage::Transform(Box::new(SelectStage::new(columns.clone()))))
        }
        StageSpec::Sort { column } => {
            Ok(Stage::Transform(Box::new(SortStage::new(column.clone()))))
        }
    }
}

fn build_parser(
    format: &str,
    policy: FailurePolicy,
    schema: &[String],
    dtype: &std::collections::BTreeMap<String, FieldType>,
    registry: &mut ParserRegistry,
) -> Result<Box<dyn RecordParser>, WorkflowError> {
    let declared_fields = || -> Result<Vec<Field>, WorkflowError> {
        if schema.is_empty() {
            return Err(WorkflowError::config(
                "parse.schema",
                format!("built-in format '{format}' requires target fields"),
            ));
        }
        Ok(schema
            .iter()
            .map(|n| Field::new(n, dtype.get(n).copied().unwrap_or_default()))
            .collect())
    };

    match format {
        "json" => Ok(Box::new(JsonRecordParser::new(declared_fields()?, policy))),
        "kv" => Ok(Box::new(KvRecordParser::new(declared_fields()?, policy))),
        other => registry.take(other).ok_or_else(|| {
            WorkflowError::config(
                "parse.format",
                format!("no parser registered for format '{other}'"),
            )
        }),
    }
}
