//! 레코드 파싱 모듈 — 형식별 파서 및 레지스트리
//!
//! [`ParserRegistry`]는 설정의 `format` 값으로 파서를 선택합니다.
//! 각 파서는 core의 [`RecordParser`](logsift_core::pipeline::RecordParser)
//! trait을 구현하며, 자신이 생성하는 스키마를 선언합니다.
//!
//! # 지원 형식
//! - 구조화 JSON 페이로드 ([`JsonRecordParser`])
//! - key=value 쌍 (프록시/DNS 로그 스타일, [`KvRecordParser`])
//!
//! # 실패 정책
//! 문법 불일치 행은 정책에 따라 Null 행 + 실패 플래그로 내보내거나
//! 드롭 후 집계합니다. 어느 쪽이든 집계 없는 손실은 없습니다.

pub mod json;
pub mod kv;

pub use json::JsonRecordParser;
pub use kv::KvRecordParser;

use logsift_core::pipeline::RecordParser;
use logsift_core::types::{Field, FieldType, Schema};

use crate::config::FailurePolicy;

/// 실패 플래그 컬럼 이름
///
/// Flag 정책 파서의 출력 스키마에 추가되는 정수 컬럼입니다
/// (0 = 정상, 1 = 문법 불일치).
pub const PARSE_FAILED_COLUMN: &str = "parse_failed";

/// 파서 출력 스키마에 실패 플래그 컬럼을 덧붙입니다.
pub(crate) fn schema_with_flag(fields: &[Field], policy: FailurePolicy) -> Schema {
    let mut fields = fields.to_vec();
    if policy == FailurePolicy::Flag {
        fields.push(Field::new(PARSE_FAILED_COLUMN, FieldType::Int));
    }
    Schema::new(fields)
}

/// 파서 레지스트리 — 형식 이름으로 파서를 선택합니다.
///
/// 등록된 파서는 `format_name()`으로 조회됩니다. 워크플로우 구성 시점에
/// 단계 스펙의 `format` 값이 여기 매칭되지 않으면 구성이 실패합니다.
pub struct ParserRegistry {
    /// 등록된 파서 목록
    parsers: Vec<Box<dyn RecordParser>>,
}

impl ParserRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// 파서를 등록합니다. 같은 형식 이름이 중복되면 먼저 등록된 쪽이
    /// 우선합니다.
    pub fn register(mut self, parser: Box<dyn RecordParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// 형식 이름으로 파서를 꺼냅니다. 단계 구성 시 소유권이 단계로
    /// 넘어갑니다.
    pub fn take(&mut self, format_name: &str) -> Option<Box<dyn RecordParser>> {
        let idx = self
            .parsers
            .iter()
            .position(|p| p.format_name() == format_name)?;
        Some(self.parsers.remove(idx))
    }

    /// 형식 이름으로 파서를 조회합니다.
    pub fn get(&self, format_name: &str) -> Option<&dyn RecordParser> {
        self.parsers
            .iter()
            .find(|p| p.format_name() == format_name)
            .map(Box::as_ref)
    }

    /// 등록된 형식 이름 목록을 반환합니다.
    pub fn registered_formats(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.format_name()).collect()
    }

    /// 등록된 파서 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// 파서가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
