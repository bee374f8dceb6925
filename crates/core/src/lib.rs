//! Logsift 공통 크레이트 — 타입, 테이블 프레임, trait, 에러, 설정
//!
//! # 모듈 구성
//!
//! - [`types`]: 원시 레코드, 스키마, 셀 값 등 전역 도메인 타입
//! - [`frame`]: 워크플로우가 사용하는 좁은 테이블 연산 집합 ([`Frame`])
//! - [`pipeline`]: 확장 포인트 trait (파서, 변환 단계, 메시지 클라이언트)
//! - [`error`]: 도메인 에러 타입
//! - [`config`]: logsift.toml 기반 엔진 전역 설정
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use config::LogsiftConfig;
pub use error::LogsiftError;
pub use frame::Frame;
pub use pipeline::{MessageClient, ParseOutcome, RecordParser, Transform};
pub use types::{Field, FieldType, RawRecord, Schema, Value};
