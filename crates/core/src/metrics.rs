//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다. 각 모듈은 이 상수를 사용하여
//! `metrics::counter!()`, `metrics::gauge!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsift_`
//! - 모듈명: `workflow_`, `source_`, `sink_`, `parser_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 워크플로우 이름 레이블 키
pub const LABEL_WORKFLOW: &str = "workflow";

/// 파서 형식 레이블 키 (json, kv)
pub const LABEL_PARSER_FORMAT: &str = "format";

/// 어댑터 종류 레이블 키 (fs, stream)
pub const LABEL_ADAPTER_KIND: &str = "kind";

/// 단계 이름 레이블 키
pub const LABEL_STAGE: &str = "stage";

// ─── Workflow 메트릭 ────────────────────────────────────────────────

/// Workflow: 처리된 배치 수 (counter)
pub const WORKFLOW_BATCHES_TOTAL: &str = "logsift_workflow_batches_total";

/// Workflow: 처리된 행 수 (counter)
pub const WORKFLOW_ROWS_TOTAL: &str = "logsift_workflow_rows_total";

/// Workflow: 단계에서 드롭된 행 수 (counter, label: stage)
pub const WORKFLOW_ROWS_DROPPED_TOTAL: &str = "logsift_workflow_rows_dropped_total";

/// Workflow: 행 단위 파싱 실패 수 (counter, label: format)
pub const WORKFLOW_PARSE_FAILURES_TOTAL: &str = "logsift_workflow_parse_failures_total";

/// Workflow: 숫자가 아니어서 점수 없이 통과한 행 수 (counter, label: stage)
///
/// 행은 유지되고 점수 컬럼만 `Null`입니다 — 드롭 카운터와 다릅니다.
pub const WORKFLOW_SCORE_SKIPPED_TOTAL: &str = "logsift_workflow_score_skipped_total";

/// Workflow: 배치 처리 지연 시간 (histogram, 초)
pub const WORKFLOW_BATCH_DURATION_SECONDS: &str = "logsift_workflow_batch_duration_seconds";

// ─── Source/Sink 메트릭 ─────────────────────────────────────────────

/// Source: 읽은 배치 수 (counter, label: kind)
pub const SOURCE_BATCHES_TOTAL: &str = "logsift_source_batches_total";

/// Source: 엄격성 정책으로 거부된 행 수 (counter)
pub const SOURCE_ROWS_REJECTED_TOTAL: &str = "logsift_source_rows_rejected_total";

/// Sink: 쓴 배치 수 (counter, label: kind)
pub const SINK_BATCHES_TOTAL: &str = "logsift_sink_batches_total";

/// Sink: 쓰기 재시도 수 (counter)
pub const SINK_RETRIES_TOTAL: &str = "logsift_sink_retries_total";
