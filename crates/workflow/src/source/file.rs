//! 파일 시스템 소스
//!
//! 구분자 형식 파일 전체를 읽어 설정된 크기의 배치로 내보내는 유한
//! 소스입니다. `open()` 시점에 파일을 읽고 dtype 강제와 행 유효성
//! 정책을 적용한 뒤, 체크포인트 위치까지 커서를 옮깁니다. 재시작한
//! 워크플로우는 이미 싱크에 반영된 행을 다시 내보내지 않습니다.

use logsift_core::frame::Frame;
use logsift_core::metrics::{LABEL_ADAPTER_KIND, SOURCE_BATCHES_TOTAL, SOURCE_ROWS_REJECTED_TOTAL};
use logsift_core::types::Schema;

use crate::checkpoint::Checkpoint;
use crate::config::FsSourceSpec;
use crate::error::WorkflowError;
use crate::source::{required_violations, SourceBatch};

/// 구분자 형식 파일을 읽는 유한 소스
pub struct FileSource {
    spec: FsSourceSpec,
    batch_rows: usize,
    /// open() 후 유효성 정책이 적용된 전체 프레임
    frame: Option<Frame>,
    /// 다음 배치의 시작 행 (프레임 기준)
    cursor: usize,
    /// open() 시 드롭된 행 수 — 첫 배치에 귀속되고, 내보낼 행이
    /// 없으면 마지막 빈 배치로 보고됩니다
    pending_rejected: u64,
}

impl FileSource {
    /// 스펙과 시작 체크포인트로 소스를 생성합니다.
    ///
    /// `batch_rows`는 스펙이 지정하지 않으면 엔진 기본값이 사용됩니다.
    pub fn new(spec: FsSourceSpec, default_batch_rows: usize, checkpoint: Checkpoint) -> Self {
        let batch_rows = spec.batch_rows.unwrap_or(default_batch_rows);
        Self {
            spec,
            batch_rows,
            frame: None,
            cursor: checkpoint.rows as usize,
            pending_rejected: 0,
        }
    }

    /// 소스 식별자를 반환합니다.
    pub fn origin(&self) -> String {
        format!("fs:{}", self.spec.input_path)
    }

    /// 파일을 읽고 dtype 강제와 행 유효성 정책을 적용합니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        let raw = Frame::read_delimited(
            &self.spec.input_path,
            self.spec.declared_schema().as_ref(),
            self.spec.delimiter_byte(),
            self.spec.header,
        )
        .map_err(|e| WorkflowError::Source {
            origin: self.origin(),
            reason: e.to_string(),
        })?;

        // 헤더에서 유도된 이름에도 dtype 매핑을 적용한다
        let target = Schema::new(
            raw.schema()
                .fields()
                .iter()
                .map(|f| {
                    let dtype = self.spec.dtype.get(&f.name).copied().unwrap_or(f.dtype);
                    logsift_core::types::Field::new(&f.name, dtype)
                })
                .collect(),
        );

        let (coerced, mut bad_rows) = raw.coerce_schema(&target)?;
        let missing = required_violations(&coerced, &target, &self.spec.required_cols)?;
        for idx in missing {
            if !bad_rows.contains(&idx) {
                bad_rows.push(idx);
            }
        }
        bad_rows.sort_unstable();

        if self.spec.strict && !bad_rows.is_empty() {
            return Err(WorkflowError::Source {
                origin: self.origin(),
                reason: format!(
                    "strict mode: {} row(s) violate the schema (first at row {})",
                    bad_rows.len(),
                    bad_rows[0]
                ),
            });
        }

        let rejected = bad_rows.len() as u64;
        let frame = if rejected > 0 {
            tracing::warn!(
                origin = %self.origin(),
                rejected,
                "dropping rows that violate the source schema"
            );
            let mut kept = Frame::empty(coerced.schema().clone());
            for (idx, row) in coerced.rows().iter().enumerate() {
                if !bad_rows.contains(&idx) {
                    kept.push_row(row.clone())?;
                }
            }
            kept
        } else {
            coerced
        };

        tracing::debug!(
            origin = %self.origin(),
            rows = frame.num_rows(),
            skipped = self.cursor,
            "file source opened"
        );
        self.pending_rejected = rejected;
        self.frame = Some(frame);
        Ok(())
    }

    /// 커서부터 최대 `batch_rows`개의 행을 내보냅니다.
    pub async fn next_batch(&mut self) -> Result<Option<SourceBatch>, WorkflowError> {
        let frame = self.frame.as_ref().ok_or_else(|| {
            WorkflowError::InvalidState("file source used before open".to_owned())
        })?;

        if self.cursor >= frame.num_rows() {
            // 모든 행이 드롭되었어도 거부 수는 보고되어야 한다
            let rejected_rows = std::mem::take(&mut self.pending_rejected);
            if rejected_rows > 0 {
                metrics::counter!(SOURCE_ROWS_REJECTED_TOTAL).increment(rejected_rows);
                return Ok(Some(SourceBatch {
                    frame: Frame::empty(frame.schema().clone()),
                    rejected_rows,
                }));
            }
            return Ok(None);
        }

        let end = (self.cursor + self.batch_rows).min(frame.num_rows());
        let mut batch = Frame::empty(frame.schema().clone());
        for idx in self.cursor..end {
            // 폭은 원본 프레임에서 이미 보장됨
            batch.push_row(frame.row(idx).map(<[_]>::to_vec).unwrap_or_default())?;
        }
        self.cursor = end;

        let rejected_rows = std::mem::take(&mut self.pending_rejected);
        metrics::counter!(SOURCE_BATCHES_TOTAL, LABEL_ADAPTER_KIND => "fs").increment(1);
        if rejected_rows > 0 {
            metrics::counter!(SOURCE_ROWS_REJECTED_TOTAL).increment(rejected_rows);
        }

        Ok(Some(SourceBatch {
            frame: batch,
            rejected_rows,
        }))
    }

    /// 소스를 닫습니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        self.frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_core::types::{FieldType, Value};
    use std::collections::BTreeMap;

    fn spec_for(path: &std::path::Path) -> FsSourceSpec {
        FsSourceSpec {
            input_format: "csv".to_owned(),
            input_path: path.to_string_lossy().into_owned(),
            delimiter: ",".to_owned(),
            schema: Vec::new(),
            dtype: BTreeMap::from([("count".to_owned(), FieldType::Int)]),
            required_cols: vec!["rule".to_owned()],
            header: Some(0),
            strict: false,
            batch_rows: None,
        }
    }

    fn write_fixture(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("in.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn emits_batches_until_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "rule,count\na,1\nb,2\nc,3\n");

        let mut source = FileSource::new(spec_for(&path), 2, Checkpoint::start());
        source.open().await.unwrap();

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.frame.num_rows(), 2);
        assert_eq!(first.frame.row(0).unwrap()[1], Value::Int(1));

        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!(second.frame.num_rows(), 1);

        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resumes_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "rule,count\na,1\nb,2\nc,3\n");

        let mut checkpoint = Checkpoint::start();
        checkpoint.advance(2);

        let mut source = FileSource::new(spec_for(&path), 10, checkpoint);
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frame.num_rows(), 1);
        assert_eq!(batch.frame.row(0).unwrap()[0], Value::Str("c".to_owned()));
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lenient_mode_drops_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        // 2행: count가 숫자가 아님, 3행: 필수 컬럼 rule 결측
        let path = write_fixture(&dir, "rule,count\na,1\nb,oops\n,3\n");

        let mut source = FileSource::new(spec_for(&path), 10, Checkpoint::start());
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frame.num_rows(), 1);
        assert_eq!(batch.rejected_rows, 2);
    }

    #[tokio::test]
    async fn all_rows_rejected_still_reported() {
        let dir = tempfile::tempdir().unwrap();
        // 두 행 모두 필수 컬럼 rule 결측
        let path = write_fixture(&dir, "rule,count\n,1\n,2\n");

        let mut source = FileSource::new(spec_for(&path), 10, Checkpoint::start());
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert!(batch.frame.is_empty());
        assert_eq!(batch.rejected_rows, 2);
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn strict_mode_fails_on_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "rule,count\na,oops\n");

        let mut spec = spec_for(&path);
        spec.strict = true;
        let mut source = FileSource::new(spec, 10, Checkpoint::start());

        let err = source.open().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Source { .. }));
        assert!(err.to_string().contains("strict"));
    }

    #[tokio::test]
    async fn missing_file_is_source_error() {
        let spec = spec_for(std::path::Path::new("/nonexistent/in.csv"));
        let mut source = FileSource::new(spec, 10, Checkpoint::start());
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Source { .. }));
    }

    #[tokio::test]
    async fn declared_schema_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "a,1\nb,2\n");

        let mut spec = spec_for(&path);
        spec.header = None;
        spec.schema = vec!["rule".to_owned(), "count".to_owned()];
        let mut source = FileSource::new(spec, 10, Checkpoint::start());
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frame.num_rows(), 2);
        assert_eq!(batch.frame.schema().names(), vec!["rule", "count"]);
        assert_eq!(batch.frame.row(1).unwrap()[1], Value::Int(2));
    }
}
