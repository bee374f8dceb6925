//! 테이블 프레임 — 워크플로우가 사용하는 좁은 테이블 연산 집합
//!
//! [`Frame`]은 스키마가 고정된 인메모리 테이블입니다. 워크플로우 엔진은
//! 여기 정의된 연산만 사용합니다: 생성, 구분자 형식 읽기/쓰기, 컬럼 선택,
//! 행 필터, 그룹 집계, 키 병합, 정렬. 범용 데이터프레임 API가 아닙니다.
//!
//! # 불변 규칙
//! - 스키마는 프레임 생성 시 고정됩니다 (컬럼 추가는 새 프레임 반환).
//! - 모든 행은 선언된 컬럼 수만큼 값을 가집니다 (결측치는 `Null`).

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use crate::error::FrameError;
use crate::types::{Field, FieldType, Schema, Value};

/// 스키마 고정 인메모리 테이블
///
/// 행 단위 저장이지만 외부에는 불투명합니다. 워크플로우 엔진과 파서는
/// 공개된 좁은 연산만 사용합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 고정 스키마
    schema: Schema,
    /// 행 데이터 (각 행의 길이 == schema.width())
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// 빈 프레임을 생성합니다.
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// 행 목록으로 프레임을 생성합니다.
    ///
    /// 스키마 폭과 다른 행이 있으면 `WidthMismatch` 에러를 반환합니다.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, FrameError> {
        let width = schema.width();
        for row in &rows {
            if row.len() != width {
                return Err(FrameError::WidthMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
        }
        Ok(Self { schema, rows })
    }

    /// 행을 추가합니다.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), FrameError> {
        if row.len() != self.schema.width() {
            return Err(FrameError::WidthMismatch {
                expected: self.schema.width(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// 스키마를 반환합니다.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// 행 수를 반환합니다.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// 행이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 행 목록에 대한 참조를 반환합니다.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// 인덱스로 행을 조회합니다.
    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// 이름으로 컬럼 값 목록을 복제하여 반환합니다.
    pub fn column(&self, name: &str) -> Result<Vec<Value>, FrameError> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_owned()))?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// 숫자 컬럼을 f64 시퀀스로 반환합니다 (숫자가 아닌 값은 None).
    ///
    /// 롤링 통계 등 수치 분석의 입력으로 사용됩니다.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, FrameError> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_owned()))?;
        Ok(self.rows.iter().map(|row| row[idx].as_f64()).collect())
    }

    /// 지정한 컬럼만 남긴 새 프레임을 반환합니다.
    ///
    /// 컬럼 순서는 인자 순서를 따릅니다.
    pub fn select(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut indices = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .schema
                .index_of(name)
                .ok_or_else(|| FrameError::UnknownColumn((*name).to_owned()))?;
            indices.push(idx);
            fields.push(self.schema.fields()[idx].clone());
        }

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Self {
            schema: Schema::new(fields),
            rows,
        })
    }

    /// 술어를 만족하는 행만 남긴 새 프레임을 반환합니다.
    ///
    /// 행 순서는 유지됩니다.
    pub fn filter(&self, predicate: impl Fn(&[Value]) -> bool) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// 컬럼 값별 행 수를 집계한 새 프레임을 반환합니다.
    ///
    /// 결과 스키마는 `[기준 컬럼, count(int)]`이며, 첫 등장 순서를 유지합니다.
    pub fn group_count(&self, by: &str) -> Result<Self, FrameError> {
        let idx = self
            .schema
            .index_of(by)
            .ok_or_else(|| FrameError::UnknownColumn(by.to_owned()))?;

        let mut keys: Vec<Value> = Vec::new();
        let mut counts: Vec<i64> = Vec::new();
        for row in &self.rows {
            let key = &row[idx];
            match keys.iter().position(|k| k == key) {
                Some(pos) => counts[pos] += 1,
                None => {
                    keys.push(key.clone());
                    counts.push(1);
                }
            }
        }

        let schema = Schema::new(vec![
            self.schema.fields()[idx].clone(),
            Field::new("count", FieldType::Int),
        ]);
        let rows = keys
            .into_iter()
            .zip(counts)
            .map(|(k, c)| vec![k, Value::Int(c)])
            .collect();
        Ok(Self { schema, rows })
    }

    /// 키 컬럼 기준 내부 병합(inner join)을 수행합니다.
    ///
    /// 결과 스키마는 self 전체 컬럼 + other의 키 제외 컬럼입니다.
    /// 양쪽 모두 키 컬럼이 있어야 합니다.
    pub fn join(&self, other: &Self, on: &str) -> Result<Self, FrameError> {
        let left_idx = self
            .schema
            .index_of(on)
            .ok_or_else(|| FrameError::Join(format!("left frame has no key column '{on}'")))?;
        let right_idx = other
            .schema
            .index_of(on)
            .ok_or_else(|| FrameError::Join(format!("right frame has no key column '{on}'")))?;

        let mut fields = self.schema.fields().to_vec();
        for (i, field) in other.schema.fields().iter().enumerate() {
            if i != right_idx {
                fields.push(field.clone());
            }
        }

        let mut rows = Vec::new();
        for left in &self.rows {
            for right in &other.rows {
                if left[left_idx] == right[right_idx] {
                    let mut merged = left.clone();
                    for (i, value) in right.iter().enumerate() {
                        if i != right_idx {
                            merged.push(value.clone());
                        }
                    }
                    rows.push(merged);
                }
            }
        }

        Ok(Self {
            schema: Schema::new(fields),
            rows,
        })
    }

    /// 컬럼 기준 오름차순으로 정렬한 새 프레임을 반환합니다.
    ///
    /// 명시적 재정렬 연산입니다. 동일 키 간에는 기존 순서를 유지합니다
    /// (안정 정렬).
    pub fn sort_by(&self, column: &str) -> Result<Self, FrameError> {
        let idx = self
            .schema
            .index_of(column)
            .ok_or_else(|| FrameError::UnknownColumn(column.to_owned()))?;

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| compare_values(&a[idx], &b[idx]));
        Ok(Self {
            schema: self.schema.clone(),
            rows,
        })
    }

    /// 컬럼을 추가한 새 프레임을 반환합니다.
    ///
    /// 값 개수는 행 수와 같아야 합니다. 파서의 실패 플래그 컬럼,
    /// 롤링 점수 컬럼 추가에 사용됩니다.
    pub fn with_column(
        &self,
        field: Field,
        values: Vec<Value>,
    ) -> Result<Self, FrameError> {
        if values.len() != self.rows.len() {
            return Err(FrameError::WidthMismatch {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let schema = self.schema.with_field(field);
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut extended = row.clone();
                extended.push(value);
                extended
            })
            .collect();
        Ok(Self { schema, rows })
    }

    /// 대상 스키마에 맞게 값을 변환한 새 프레임을 반환합니다.
    ///
    /// 변환에 실패한 셀은 `Null`이 되고 해당 행 인덱스가 수집됩니다.
    /// 드롭할지 배치를 실패시킬지는 호출자의 엄격성 정책이 결정합니다.
    pub fn coerce_schema(&self, target: &Schema) -> Result<(Self, Vec<usize>), FrameError> {
        if target.width() != self.schema.width() {
            return Err(FrameError::WidthMismatch {
                expected: self.schema.width(),
                actual: target.width(),
            });
        }

        let mut failed_rows = Vec::new();
        let mut rows = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let mut converted = Vec::with_capacity(row.len());
            let mut failed = false;
            for (value, field) in row.iter().zip(target.fields()) {
                let cell = match value {
                    Value::Null => Value::Null,
                    other => match Value::coerce(&other.render(), field.dtype) {
                        Some(v) => v,
                        None => {
                            failed = true;
                            Value::Null
                        }
                    },
                };
                converted.push(cell);
            }
            if failed {
                failed_rows.push(row_idx);
            }
            rows.push(converted);
        }

        Ok((
            Self {
                schema: target.clone(),
                rows,
            },
            failed_rows,
        ))
    }

    /// 구분자 형식 파일을 읽어 프레임을 생성합니다.
    ///
    /// # 헤더 정책
    /// - `header = Some(n)`: n번째(0 기반) 행을 헤더로 사용하고 그 이전 행은 버립니다.
    /// - `header = None`: 헤더 없음. `schema`가 반드시 주어져야 합니다.
    ///
    /// `schema`가 주어지면 헤더 이름보다 우선합니다. 폭이 부족한 행은
    /// `Null`로 채워지고 초과분은 잘립니다 (코덱 수준 관용 — 행 유효성
    /// 정책은 소스 어댑터가 적용).
    pub fn read_delimited(
        path: impl AsRef<Path>,
        schema: Option<&Schema>,
        delimiter: u8,
        header: Option<usize>,
    ) -> Result<Self, FrameError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_path(path.as_ref())
            .map_err(|e| FrameError::Codec(e.to_string()))?;

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| FrameError::Codec(e.to_string()))?;
            records.push(record);
        }

        let (schema, data_start) = match (schema, header) {
            (Some(s), Some(h)) => (s.clone(), h + 1),
            (Some(s), None) => (s.clone(), 0),
            (None, Some(h)) => {
                let header_record = records.get(h).ok_or_else(|| {
                    FrameError::Codec(format!("header row {h} out of range"))
                })?;
                let names: Vec<&str> = header_record.iter().collect();
                (Schema::all_str(&names), h + 1)
            }
            (None, None) => {
                return Err(FrameError::Codec(
                    "either a schema or a header row is required".to_owned(),
                ));
            }
        };

        let width = schema.width();
        let mut rows = Vec::new();
        for record in records.iter().skip(data_start) {
            let mut row = Vec::with_capacity(width);
            for i in 0..width {
                match record.get(i) {
                    Some(cell) => row.push(
                        Value::coerce(cell, FieldType::Str).unwrap_or(Value::Null),
                    ),
                    None => row.push(Value::Null),
                }
            }
            rows.push(row);
        }

        Ok(Self { schema, rows })
    }

    /// 프레임을 구분자 형식 파일로 씁니다.
    ///
    /// `append = false`이면 파일을 새로 만들고 헤더를 씁니다.
    /// `append = true`이면 기존 파일 뒤에 이어 쓰며, 파일이 비어 있을 때만
    /// 헤더를 씁니다. 스트리밍 싱크가 배치마다 호출해도 기존 출력이
    /// 손상되지 않습니다.
    pub fn write_delimited(
        &self,
        path: impl AsRef<Path>,
        delimiter: u8,
        append: bool,
    ) -> Result<(), FrameError> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        if append {
            options.create(true).append(true);
        } else {
            options.create(true).write(true).truncate(true);
        }
        let file = options
            .open(path)
            .map_err(|e| FrameError::Codec(format!("{}: {e}", path.display())))?;

        let write_header = !append
            || file
                .metadata()
                .map(|m| m.len() == 0)
                .unwrap_or(true);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_writer(file);

        if write_header {
            writer
                .write_record(self.schema.names())
                .map_err(|e| FrameError::Codec(e.to_string()))?;
        }
        for row in &self.rows {
            let rendered: Vec<String> = row.iter().map(Value::render).collect();
            writer
                .write_record(&rendered)
                .map_err(|e| FrameError::Codec(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| FrameError::Codec(e.to_string()))?
            .flush()
            .map_err(|e| FrameError::Codec(e.to_string()))?;
        Ok(())
    }
}

/// 정렬용 값 비교 — Null을 가장 앞에, 타입 혼합 시 표현 문자열 기준.
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => {
            (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Value::Float(x), Value::Int(y)) => {
            x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal)
        }
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (x, y) => x.render().cmp(&y.render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        let schema = Schema::new(vec![
            Field::new("rule", FieldType::Str),
            Field::new("count", FieldType::Int),
        ]);
        Frame::from_rows(
            schema,
            vec![
                vec![Value::Str("ssh_brute".to_owned()), Value::Int(4)],
                vec![Value::Str("dns_tunnel".to_owned()), Value::Int(9)],
                vec![Value::Str("ssh_brute".to_owned()), Value::Int(2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_rows_rejects_width_mismatch() {
        let schema = Schema::all_str(&["a", "b"]);
        let result = Frame::from_rows(schema, vec![vec![Value::Null]]);
        assert!(matches!(
            result,
            Err(FrameError::WidthMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn select_reorders_columns() {
        let frame = sample_frame();
        let selected = frame.select(&["count", "rule"]).unwrap();
        assert_eq!(selected.schema().names(), vec!["count", "rule"]);
        assert_eq!(selected.row(0).unwrap()[0], Value::Int(4));
    }

    #[test]
    fn select_unknown_column_fails() {
        let frame = sample_frame();
        assert!(matches!(
            frame.select(&["missing"]),
            Err(FrameError::UnknownColumn(_))
        ));
    }

    #[test]
    fn filter_preserves_order() {
        let frame = sample_frame();
        let filtered = frame.filter(|row| row[1].as_f64().unwrap_or(0.0) > 3.0);
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.row(0).unwrap()[0], Value::Str("ssh_brute".to_owned()));
        assert_eq!(filtered.row(1).unwrap()[0], Value::Str("dns_tunnel".to_owned()));
    }

    #[test]
    fn group_count_first_seen_order() {
        let frame = sample_frame();
        let grouped = frame.group_count("rule").unwrap();
        assert_eq!(grouped.schema().names(), vec!["rule", "count"]);
        assert_eq!(grouped.num_rows(), 2);
        assert_eq!(grouped.row(0).unwrap()[1], Value::Int(2));
        assert_eq!(grouped.row(1).unwrap()[1], Value::Int(1));
    }

    #[test]
    fn join_on_key() {
        let frame = sample_frame();
        let severity = Frame::from_rows(
            Schema::all_str(&["rule", "severity"]),
            vec![
                vec![
                    Value::Str("ssh_brute".to_owned()),
                    Value::Str("high".to_owned()),
                ],
                vec![
                    Value::Str("dns_tunnel".to_owned()),
                    Value::Str("critical".to_owned()),
                ],
            ],
        )
        .unwrap();

        let joined = frame.join(&severity, "rule").unwrap();
        assert_eq!(joined.schema().names(), vec!["rule", "count", "severity"]);
        assert_eq!(joined.num_rows(), 3);
        assert_eq!(joined.row(0).unwrap()[2], Value::Str("high".to_owned()));
    }

    #[test]
    fn join_missing_key_fails() {
        let frame = sample_frame();
        let other = Frame::empty(Schema::all_str(&["unrelated"]));
        assert!(matches!(
            frame.join(&other, "rule"),
            Err(FrameError::Join(_))
        ));
    }

    #[test]
    fn sort_by_is_stable() {
        let frame = sample_frame();
        let sorted = frame.sort_by("count").unwrap();
        assert_eq!(sorted.row(0).unwrap()[1], Value::Int(2));
        assert_eq!(sorted.row(2).unwrap()[1], Value::Int(9));
    }

    #[test]
    fn with_column_extends_schema() {
        let frame = sample_frame();
        let extended = frame
            .with_column(
                Field::new("score", FieldType::Float),
                vec![Value::Float(0.1), Value::Float(2.4), Value::Null],
            )
            .unwrap();
        assert_eq!(extended.schema().width(), 3);
        assert_eq!(extended.row(2).unwrap()[2], Value::Null);
        // 원본은 그대로
        assert_eq!(frame.schema().width(), 2);
    }

    #[test]
    fn with_column_length_mismatch_fails() {
        let frame = sample_frame();
        let result = frame.with_column(Field::new("x", FieldType::Int), vec![Value::Int(1)]);
        assert!(result.is_err());
    }

    #[test]
    fn coerce_schema_collects_failed_rows() {
        let raw = Frame::from_rows(
            Schema::all_str(&["name", "count"]),
            vec![
                vec![Value::Str("a".to_owned()), Value::Str("3".to_owned())],
                vec![Value::Str("b".to_owned()), Value::Str("oops".to_owned())],
            ],
        )
        .unwrap();
        let target = Schema::new(vec![
            Field::new("name", FieldType::Str),
            Field::new("count", FieldType::Int),
        ]);

        let (coerced, failed) = raw.coerce_schema(&target).unwrap();
        assert_eq!(coerced.row(0).unwrap()[1], Value::Int(3));
        assert_eq!(coerced.row(1).unwrap()[1], Value::Null);
        assert_eq!(failed, vec![1]);
    }

    #[test]
    fn delimited_roundtrip_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let frame = sample_frame();
        frame.write_delimited(&path, b',', false).unwrap();

        let read = Frame::read_delimited(&path, None, b',', Some(0)).unwrap();
        assert_eq!(read.schema().names(), vec!["rule", "count"]);
        assert_eq!(read.num_rows(), 3);
        // 헤더 없는 재읽기이므로 모든 값은 문자열
        assert_eq!(read.row(0).unwrap()[1], Value::Str("4".to_owned()));
    }

    #[test]
    fn delimited_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let frame = sample_frame();
        frame.write_delimited(&path, b',', true).unwrap();
        frame.write_delimited(&path, b',', true).unwrap();

        let read = Frame::read_delimited(&path, None, b',', Some(0)).unwrap();
        assert_eq!(read.num_rows(), 6);
    }

    #[test]
    fn read_delimited_requires_schema_or_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        assert!(Frame::read_delimited(&path, None, b',', None).is_err());
    }

    #[test]
    fn read_delimited_pads_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();

        let read = Frame::read_delimited(&path, None, b',', Some(0)).unwrap();
        assert_eq!(read.row(0).unwrap()[2], Value::Null);
    }

    #[test]
    fn read_delimited_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.tsv");
        std::fs::write(&path, "x\ty\n7\t8\n").unwrap();

        let read = Frame::read_delimited(&path, None, b'\t', Some(0)).unwrap();
        assert_eq!(read.schema().names(), vec!["x", "y"]);
        assert_eq!(read.row(0).unwrap()[0], Value::Str("7".to_owned()));
    }
}
