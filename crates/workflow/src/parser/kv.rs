//! key=value 페이로드 파서
//!
//! 공백으로 구분된 `key=value` 쌍 형식을 파싱합니다. 프록시,
//! DNS, 방화벽 로그에서 흔한 형식입니다. 값에 공백이 필요하면
//! 큰따옴표로 감쌉니다 (`msg="connection reset"`).

use std::collections::HashMap;

use logsift_core::error::ParseError;
use logsift_core::frame::Frame;
use logsift_core::pipeline::{ParseOutcome, RecordParser};
use logsift_core::types::{Field, Schema, Value};

use super::schema_with_flag;
use crate::config::FailurePolicy;

/// key=value 페이로드 파서
pub struct KvRecordParser {
    /// 대상 필드 목록 (key == 필드 이름)
    fields: Vec<Field>,
    /// 행 실패 정책
    policy: FailurePolicy,
}

impl KvRecordParser {
    /// 대상 필드 목록과 실패 정책으로 파서를 생성합니다.
    pub fn new(fields: Vec<Field>, policy: FailurePolicy) -> Self {
        Self { fields, policy }
    }

    /// 한 줄을 key→value 맵으로 토큰화합니다.
    ///
    /// `=`가 없는 토큰이 하나라도 있으면 행 전체가 문법 불일치입니다.
    fn tokenize(raw: &str) -> Result<HashMap<&str, String>, ParseError> {
        let mut pairs = HashMap::new();
        let mut rest = raw.trim();

        while !rest.is_empty() {
            let Some(eq) = rest.find('=') else {
                return Err(ParseError::Failed {
                    row: 0,
                    reason: format!("token without '=' near '{rest}'"),
                });
            };
            let (key, after_eq) = rest.split_at(eq);
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(ParseError::Failed {
                    row: 0,
                    reason: format!("malformed key near '{rest}'"),
                });
            }
            let after_eq = &after_eq[1..];

            let (value, remainder) = if let Some(quoted) = after_eq.strip_prefix('"') {
                let Some(close) = quoted.find('"') else {
                    return Err(ParseError::Failed {
                        row: 0,
                        reason: "unterminated quoted value".to_owned(),
                    });
                };
                (quoted[..close].to_owned(), &quoted[close + 1..])
            } else {
                match after_eq.find(char::is_whitespace) {
                    Some(ws) => (after_eq[..ws].to_owned(), &after_eq[ws..]),
                    None => (after_eq.to_owned(), ""),
                }
            };

            pairs.insert(key, value);
            rest = remainder.trim_start();
        }

        Ok(pairs)
    }

    /// 토큰 맵에서 선언된 필드 순서대로 행을 구성합니다.
    fn build_row(&self, pairs: &HashMap<&str, String>) -> Result<Vec<Value>, ParseError> {
        let mut row = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match pairs.get(field.name.as_str()) {
                None => row.push(Value::Null),
                Some(raw) => match Value::coerce(raw, field.dtype) {
                    Some(value) => row.push(value),
                    None => {
                        return Err(ParseError::Failed {
                            row: 0,
                            reason: format!(
                                "value '{raw}' for key '{}' is not a {}",
                                field.name, field.dtype
                            ),
                        });
                    }
                },
            }
        }
        Ok(row)
    }
}

impl RecordParser for KvRecordParser {
    fn format_name(&self) -> &str {
        "kv"
    }

    fn schema(&self) -> Schema {
        schema_with_flag(&self.fields, self.policy)
    }

    fn parse(&self, batch: &Frame, column: &str) -> Result<ParseOutcome, ParseError> {
        let source = batch
            .column(column)
            .map_err(|_| ParseError::UnsupportedFormat(format!("missing column '{column}'")))?;

        let mut frame = Frame::empty(self.schema());
        let mut failed_rows = 0u64;
        let mut dropped_rows = 0u64;

        for value in &source {
            let result = value
                .as_str()
                .ok_or_else(|| ParseError::Failed {
                    row: 0,
                    reason: "source column is not a string".to_owned(),
                })
                .and_then(Self::tokenize)
                .and_then(|pairs| self.build_row(&pairs));

            match result {
                Ok(mut row) => {
                    if self.policy == FailurePolicy::Flag {
                        row.push(Value::Int(0));
                    }
                    frame.push_row(row).map_err(|e| ParseError::Failed {
                        row: 0,
                        reason: e.to_string(),
                    })?;
                }
                Err(_) => {
                    failed_rows += 1;
                    match self.policy {
                        FailurePolicy::Flag => {
                            let mut row = vec![Value::Null; self.fields.len()];
                            row.push(Value::Int(1));
                            frame.push_row(row).map_err(|e| ParseError::Failed {
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
