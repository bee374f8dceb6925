//! logsift-workflow: 배치 워크플로우 엔진
//!
//! 보안 텔레메트리 배치 파이프라인의 실행 계층입니다. 소스 어댑터가
//! 원시 입력을 표준 배치로 바꾸고, 단계 체인이 파싱/선택/정렬/통계
//! 변환을 적용하고, 싱크 어댑터가 결과를 목적지에 기록합니다.
//!
//! # 모듈 구성
//! - [`config`]: 워크플로우 정의 (TOML, 태그드 배리언트)
//! - [`source`] / [`sink`]: 파일/스트림 어댑터
//! - [`parser`]: 형식별 레코드 파서 (json, kv) 및 레지스트리
//! - [`stage`]: 단계 체인 실행과 행 수지 집계
//! - [`stats`]: 롤링 윈도우 z-score
//! - [`checkpoint`]: 재개 지점 마커
//! - [`broker`]: 인메모리 토픽 브로커 (로컬 배선/테스트)
//! - [`workflow`]: 상태 기계와 실행 루프
//!
//! # 사용 예시
//! ```ignore
//! use logsift_workflow::{Workflow, WorkflowConfig};
//!
//! let config = WorkflowConfig::from_file("workflow.toml").await?;
//! let mut workflow = Workflow::builder(config).build()?;
//! let report = workflow.run().await?;
//! ```

pub mod broker;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod parser;
pub mod sink;
pub mod source;
pub mod stage;
pub mod stats;
pub mod workflow;

pub use broker::{MemoryBroker, MemoryClient};
pub use checkpoint::Checkpoint;
pub use config::{FailurePolicy, SinkSpec, SourceSpec, StageSpec, WorkflowConfig};
pub use error::WorkflowError;
pub use parser::{JsonRecordParser, KvRecordParser, ParserRegistry};
pub use sink::{RetryPolicy, SinkAdapter};
pub use source::{SourceAdapter, SourceBatch};
pub use stage::{Stage, StageStats};
pub use stats::{rolling_zscore, RollingScoreStage, RollingWindow, RollingZScore};
pub use workflow::{RunReport, Workflow, WorkflowBuilder, WorkflowState};
