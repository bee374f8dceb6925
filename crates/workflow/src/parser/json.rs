//! JSON 페이로드 파서
//!
//! 원시 컬럼에 담긴 JSON 객체 한 건을 선언된 스키마의 구조화 행으로
//! 변환합니다. dot notation으로 중첩 필드에 접근할 수 있습니다
//! (예: "event.src_ip").
//!
//! # 사용 예시
//! ```ignore
//! use logsift_workflow::parser::JsonRecordParser;
//! use logsift_workflow::config::FailurePolicy;
//! use logsift_core::types::{Field, FieldType};
//!
//! let parser = JsonRecordParser::new(
//!     vec![Field::new("host", FieldType::Str), Field::new("bytes", FieldType::Int)],
//!     FailurePolicy::Flag,
//! );
//! let outcome = parser.parse(&batch, "raw")?;
//! ```

use logsift_core::error::ParseError;
use logsift_core::frame::Frame;
use logsift_core::pipeline::{ParseOutcome, RecordParser};
use logsift_core::types::{Field, FieldType, Schema, Value};

use super::schema_with_flag;
use crate::config::FailurePolicy;

/// JSON 페이로드 파서
///
/// 선언된 대상 필드 목록에 따라 JSON 객체에서 값을 추출하고
/// 의미 타입으로 변환합니다. 파서 자체는 상태가 없으며 호출 간
/// 공유 가변 상태도 없습니다.
pub struct JsonRecordParser {
    /// 대상 필드 목록 (JSON 키 경로 == 필드 이름)
    fields: Vec<Field>,
    /// 행 실패 정책
    policy: FailurePolicy,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl JsonRecordParser {
    /// 대상 필드 목록과 실패 정책으로 파서를 생성합니다.
    pub fn new(fields: Vec<Field>, policy: FailurePolicy) -> Self {
        Self {
            fields,
            policy,
            max_input_size: 1024 * 1024, // 1MB
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// JSON 값에서 dot notation 경로로 하위 값을 찾습니다.
    fn lookup<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
        let mut current = value;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// JSON 값을 의미 타입에 맞는 셀 값으로 변환합니다.
    ///
    /// 키 부재와 JSON null은 `Null`이 됩니다. 타입 불일치는 None을
    /// 반환하여 행 실패로 처리됩니다.
    fn extract(value: &serde_json::Value, field: &Field) -> Option<Value> {
        let Some(found) = Self::lookup(value, &field.name) else {
            return Some(Value::Null);
        };
        if found.is_null() {
            return Some(Value::Null);
        }
        match field.dtype {
            FieldType::Str | FieldType::Categorical => match found {
                serde_json::Value::String(s) => Some(Value::Str(s.clone())),
                serde_json::Value::Number(n) => Some(Value::Str(n.to_string())),
                serde_json::Value::Bool(b) => Some(Value::Str(b.to_string())),
                _ => None,
            },
            FieldType::Int => found.as_i64().map(Value::Int),
            FieldType::Float => found.as_f64().map(Value::Float),
            FieldType::Timestamp => found
                .as_str()
                .and_then(|s| Value::coerce(s, FieldType::Timestamp)),
        }
    }

    /// 원시 문자열 한 건을 행으로 변환합니다.
    fn parse_payload(&self, raw: &str) -> Result<Vec<Value>, ParseError> {
        if raw.len() > self.max_input_size {
            return Err(ParseError::TooLarge {
                size: raw.len(),
                max: self.max_input_size,
            });
        }
        let parsed: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ParseError::Failed {
                row: 0,
                reason: e.to_string(),
            })?;
        if !parsed.is_object() {
            return Err(ParseError::Failed {
                row: 0,
                reason: "payload is not a JSON object".to_owned(),
            });
        }

        let mut row = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match Self::extract(&parsed, field) {
                Some(value) => row.push(value),
                None => {
                    return Err(ParseError::Failed {
                        row: 0,
                        reason: format!("field '{}' is not a {}", field.name, field.dtype),
                    });
                }
            }
        }
        Ok(row)
    }
}

impl RecordParser for JsonRecordParser {
    fn format_name(&self) -> &str {
        "json"
    }

    fn schema(&self) -> Schema {
        schema_with_flag(&self.fields, self.policy)
    }

    fn parse(&self, batch: &Frame, column: &str) -> Result<ParseOutcome, ParseError> {
        let source = batch
            .column(column)
            .map_err(|_| ParseError::UnsupportedFormat(format!("missing column '{column}'")))?;

        let schema = self.schema();
        let mut frame = Frame::empty(schema.clone());
        let mut failed_rows = 0u64;
        let mut dropped_rows = 0u64;

        for value in &source {
            let result = value
                .as_str()
                .ok_or_else(|| ParseError::Failed {
                    row: 0,
                    reason: "source column is not a string".to_owned(),
                })
                .and_then(|raw| self.parse_payload(raw));

            match result {
                Ok(mut row) => {
                    if self.policy == FailurePolicy::Flag {
                        row.push(Value::Int(0));
                    }
                    frame
                        .push_row(row)
                        .map_err(|e| ParseError::Failed {
                            row: 0,
                            reason: e.to_string(),
                        })?;
                }
                Err(ParseError::TooLarge { size, max }) => {
                    // 입력 크기 초과는 배치 전체 실패로 승격
                    return Err(ParseError::TooLarge { size, max });
                }
                Err(_) => {
                    failed_rows += 1;
                    match self.policy {
                        FailurePolicy::Flag => {
                            let mut row = vec![Value::Null; self.fields.len()];
                            row.push(Value::Int(1));
                            frame
                                .push_row(row)
                                .map_err(|e| ParseError::Failed {
                                    row: 0,
                                    reason: e.to_string(),
                                })?;
                        }
                        FailurePolicy::Drop => dropped_rows += 1,
                    }
                }
            }
        }

        Ok(ParseOutcome {
            frame,
            dropped_rows,
            failed_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_batch(payloads: &[&str]) -> Frame {
        let schema = Schema::all_str(&["raw"]);
        let rows = payloads
            .iter()
            .map(|p| vec![Value::Str((*p).to_owned())])
            .collect();
        Frame::from_rows(schema, rows).unwrap()
    }

    fn parser(policy: FailurePolicy) -> JsonRecordParser {
        JsonRecordParser::new(
            vec![
                Field::new("host", FieldType::Str),
                Field::new("bytes", FieldType::Int),
            ],
            policy,
        )
    }

    #[test]
    fn parses_flat_objects() {
        let batch = raw_batch(&[
            r#"{"host":"web-01","bytes":512}"#,
            r#"{"host":"web-02","bytes":2048}"#,
        ]);
        let outcome = parser(FailurePolicy::Flag).parse(&batch, "raw").unwrap();

        assert_eq!(outcome.frame.num_rows(), 2);
        assert_eq!(outcome.failed_rows, 0);
        assert_eq!(outcome.frame.row(0).unwrap()[0], Value::Str("web-01".to_owned()));
        assert_eq!(outcome.frame.row(1).unwrap()[1], Value::Int(2048));
        // 정상 행의 실패 플래그는 0
        assert_eq!(outcome.frame.row(0).unwrap()[2], Value::Int(0));
    }

    #[test]
    fn nested_field_via_dot_notation() {
        let parser = JsonRecordParser::new(
            vec![Field::new("event.src_ip", FieldType::Str)],
            FailurePolicy::Drop,
        );
        let batch = raw_batch(&[r#"{"event":{"src_ip":"10.0.0.9"}}"#]);
        let outcome = parser.parse(&batch, "raw").unwrap();
        assert_eq!(
            outcome.frame.row(0).unwrap()[0],
            Value::Str("10.0.0.9".to_owned())
        );
    }

    #[test]
    fn flag_policy_emits_null_row() {
        let batch = raw_batch(&[r#"{"host":"a","bytes":1}"#, "not json at all"]);
        let outcome = parser(FailurePolicy::Flag).parse(&batch, "raw").unwrap();

        // 출력 행 수 + 드롭 행 수 == 입력 행 수
        assert_eq!(outcome.frame.num_rows(), 2);
        assert_eq!(outcome.dropped_rows, 0);
        assert_eq!(outcome.failed_rows, 1);

        let failed = outcome.frame.row(1).unwrap();
        assert_eq!(failed[0], Value::Null);
        assert_eq!(failed[1], Value::Null);
        assert_eq!(failed[2], Value::Int(1));
    }

    #[test]
    fn drop_policy_counts_dropped() {
        let batch = raw_batch(&[r#"{"host":"a","bytes":1}"#, "garbage", "{}"]);
        let outcome = parser(FailurePolicy::Drop).parse(&batch, "raw").unwrap();

        // "{}"는 키 부재 → Null 채움으로 정상 처리
        assert_eq!(outcome.frame.num_rows(), 2);
        assert_eq!(outcome.dropped_rows, 1);
        assert_eq!(outcome.failed_rows, 1);
        assert_eq!(
            outcome.frame.num_rows() as u64 + outcome.dropped_rows,
            batch.num_rows() as u64
        );
    }

    #[test]
    fn missing_keys_become_null() {
        let batch = raw_batch(&[r#"{"host":"only-host"}"#]);
        let outcome = parser(FailurePolicy::Drop).parse(&batch, "raw").unwrap();
        assert_eq!(outcome.frame.row(0).unwrap()[1], Value::Null);
        assert_eq!(outcome.failed_rows, 0);
    }

    #[test]
    fn type_mismatch_is_row_failure() {
        let batch = raw_batch(&[r#"{"host":"a","bytes":"not-a-number"}"#]);
        let outcome = parser(FailurePolicy::Drop).parse(&batch, "raw").unwrap();
        assert_eq!(outcome.frame.num_rows(), 0);
        assert_eq!(outcome.dropped_rows, 1);
    }

    #[test]
    fn oversized_input_fails_batch() {
        let parser = parser(FailurePolicy::Flag).with_max_input_size(8);
        let batch = raw_batch(&[r#"{"host":"aaaaaaaaaaaaaaaa"}"#]);
        let result = parser.parse(&batch, "raw");
        assert!(matches!(result, Err(ParseError::TooLarge { .. })));
    }

    #[test]
    fn missing_source_column_fails_batch() {
        let batch = raw_batch(&["{}"]);
        let result = parser(FailurePolicy::Flag).parse(&batch, "missing");
        assert!(matches!(result, Err(ParseError::UnsupportedFormat(_))));
    }

    #[test]
    fn timestamp_extraction() {
        let parser = JsonRecordParser::new(
            vec![Field::new("ts", FieldType::Timestamp)],
            FailurePolicy::Drop,
        );
        let batch = raw_batch(&[r#"{"ts":"2024-01-15T12:00:00Z"}"#]);
        let outcome = parser.parse(&batch, "raw").unwrap();
        assert!(matches!(
            outcome.frame.row(0).unwrap()[0],
            Value::Timestamp(_)
        ));
    }
}
