//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 텔레메트리 레코드, 스키마, 셀 값 등 모든 모듈이 공유하는
//! 데이터 구조를 정의합니다.

use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 수집된 원시 텔레메트리 레코드
///
/// 소스 어댑터가 생성하고 파서가 소비하는, 아직 파싱되지 않은
/// 한 단위의 텔레메트리입니다 (텍스트 한 줄 또는 메시지 페이로드).
/// 읽힌 이후에는 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 원시 페이로드 바이트
    pub payload: Bytes,
    /// 수집 소스 식별자 (예: "fs:/data/alerts.csv", "stream:dns-events")
    pub origin: String,
    /// 수집 시각
    pub ingested_at: SystemTime,
}

impl RawRecord {
    /// 새 RawRecord를 생성합니다.
    pub fn new(payload: Bytes, origin: impl Into<String>) -> Self {
        Self {
            payload,
            origin: origin.into(),
            ingested_at: SystemTime::now(),
        }
    }

    /// 페이로드를 UTF-8 문자열로 해석합니다 (손상 바이트는 대체 문자).
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// 컬럼의 의미 타입
///
/// 스키마의 각 컬럼이 가지는 의미 타입을 나타냅니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 문자열
    #[default]
    Str,
    /// 정수
    Int,
    /// 부동소수점
    Float,
    /// 타임스탬프 (RFC 3339)
    Timestamp,
    /// 범주형 (저장은 문자열, 의미상 유한 집합)
    Categorical,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// 스키마의 한 컬럼 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// 컬럼 이름
    pub name: String,
    /// 의미 타입
    pub dtype: FieldType,
}

impl Field {
    /// 새 컬럼 정의를 생성합니다.
    pub fn new(name: impl Into<String>, dtype: FieldType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// 프레임 스키마 — (이름, 의미 타입) 쌍의 순서 있는 목록
///
/// 프레임 생성 시 고정되며, 프레임의 수명 동안 변경되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// 컬럼 정의 목록 (선언 순서 유지)
    fields: Vec<Field>,
}

impl Schema {
    /// 컬럼 정의 목록으로 스키마를 생성합니다.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// 모든 컬럼을 문자열 타입으로 하는 스키마를 생성합니다.
    ///
    /// dtype 지정이 없는 구분자 형식 입력의 기본 스키마입니다.
    pub fn all_str(names: &[impl AsRef<str>]) -> Self {
        Self {
            fields: names
                .iter()
                .map(|n| Field::new(n.as_ref(), FieldType::Str))
                .collect(),
        }
    }

    /// 컬럼 정의 목록을 반환합니다.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 컬럼 수를 반환합니다.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    /// 컬럼이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 이름으로 컬럼 인덱스를 찾습니다.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// 컬럼 이름 목록을 반환합니다.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// 컬럼을 뒤에 추가한 새 스키마를 반환합니다.
    ///
    /// 기존 스키마는 변경되지 않습니다 (프레임 스키마 불변 규칙).
    pub fn with_field(&self, field: Field) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field);
        Self { fields }
    }
}

/// 프레임의 셀 값
///
/// 모든 컬럼 타입을 포괄하는 값 표현입니다. 결측치는 `Null`로 나타냅니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 결측치
    Null,
    /// 문자열 (범주형 포함)
    Str(String),
    /// 정수
    Int(i64),
    /// 부동소수점
    Float(f64),
    /// 타임스탬프
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// 결측치 여부를 확인합니다.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 숫자 값을 f64로 변환합니다. 숫자가 아니면 None.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// 문자열 값에 대한 참조를 반환합니다. 문자열이 아니면 None.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 원시 문자열을 의미 타입에 맞는 값으로 변환합니다.
    ///
    /// 빈 문자열은 `Null`로 취급합니다. 변환 실패 시 None을 반환하며,
    /// 호출자(소스 어댑터)가 엄격성 정책에 따라 처리합니다.
    pub fn coerce(raw: &str, dtype: FieldType) -> Option<Self> {
        if raw.is_empty() {
            return Some(Self::Null);
        }
        match dtype {
            FieldType::Str | FieldType::Categorical => Some(Self::Str(raw.to_owned())),
            FieldType::Int => raw.parse::<i64>().ok().map(Self::Int),
            FieldType::Float => raw.parse::<f64>().ok().map(Self::Float),
            FieldType::Timestamp => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| Self::Timestamp(dt.with_timezone(&Utc))),
        }
    }

    /// 구분자 형식 출력용 문자열 표현을 반환합니다.
    ///
    /// `Null`은 빈 문자열로 직렬화되어 `coerce`와 왕복이 성립합니다.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Str(s) => s.clone(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Timestamp(dt) => dt.to_rfc3339(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            other => write!(f, "{}", other.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_creation() {
        let raw = RawRecord::new(Bytes::from_static(b"alert line"), "fs:/data/alerts.csv");
        assert_eq!(raw.origin, "fs:/data/alerts.csv");
        assert_eq!(raw.payload_str(), "alert line");
    }

    #[test]
    fn schema_index_and_names() {
        let schema = Schema::all_str(&["firstname", "lastname", "gender"]);
        assert_eq!(schema.width(), 3);
        assert_eq!(schema.index_of("lastname"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert_eq!(schema.names(), vec!["firstname", "lastname", "gender"]);
    }

    #[test]
    fn schema_with_field_leaves_original() {
        let schema = Schema::all_str(&["a"]);
        let extended = schema.with_field(Field::new("score", FieldType::Float));
        assert_eq!(schema.width(), 1);
        assert_eq!(extended.width(), 2);
        assert_eq!(extended.index_of("score"), Some(1));
    }

    #[test]
    fn coerce_int_and_float() {
        assert_eq!(Value::coerce("42", FieldType::Int), Some(Value::Int(42)));
        assert_eq!(
            Value::coerce("2.5", FieldType::Float),
            Some(Value::Float(2.5))
        );
        assert_eq!(Value::coerce("abc", FieldType::Int), None);
    }

    #[test]
    fn coerce_empty_is_null() {
        assert_eq!(Value::coerce("", FieldType::Int), Some(Value::Null));
        assert_eq!(Value::coerce("", FieldType::Str), Some(Value::Null));
    }

    #[test]
    fn coerce_timestamp_rfc3339() {
        let v = Value::coerce("2024-01-15T12:00:00Z", FieldType::Timestamp).unwrap();
        match v {
            Value::Timestamp(dt) => assert_eq!(dt.to_rfc3339(), "2024-01-15T12:00:00+00:00"),
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn render_roundtrips_through_coerce() {
        let v = Value::Int(7);
        let rendered = v.render();
        assert_eq!(Value::coerce(&rendered, FieldType::Int), Some(v));

        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::coerce("", FieldType::Float), Some(Value::Null));
    }

    #[test]
    fn as_f64_covers_numeric_values() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Str("x".to_owned()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::Str.to_string(), "str");
        assert_eq!(FieldType::Timestamp.to_string(), "timestamp");
        assert_eq!(FieldType::Categorical.to_string(), "categorical");
    }
}
