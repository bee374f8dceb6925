//! 메시지 스트림 소스
//!
//! 브로커 토픽을 poll하여 구분자 레코드 페이로드를 배치로 변환하는
//! 무한 소스입니다. poll 타임아웃은 에러가 아니라 빈 배치이며,
//! 엔진은 빈 배치 사이에서 정지 요청을 확인합니다.

use std::collections::VecDeque;
use std::time::Duration;

use logsift_core::frame::Frame;
use logsift_core::metrics::{LABEL_ADAPTER_KIND, SOURCE_BATCHES_TOTAL, SOURCE_ROWS_REJECTED_TOTAL};
use logsift_core::pipeline::MessageClient;
use logsift_core::types::{RawRecord, Schema, Value};

use crate::config::StreamSourceSpec;
use crate::error::WorkflowError;
use crate::source::{required_violations, SourceBatch};

/// 브로커 토픽을 구독하는 무한 소스
pub struct StreamSource {
    spec: StreamSourceSpec,
    client: Box<dyn MessageClient>,
    schema: Schema,
    poll_timeout: Duration,
    batch_rows: usize,
    /// poll이 배치 크기보다 많이 반환했을 때의 이월분
    pending: VecDeque<RawRecord>,
    opened: bool,
}

impl StreamSource {
    /// 스펙과 브로커 클라이언트로 소스를 생성합니다.
    pub fn new(
        spec: StreamSourceSpec,
        client: Box<dyn MessageClient>,
        default_poll_timeout: Duration,
        default_batch_rows: usize,
    ) -> Self {
        let poll_timeout = spec
            .poll_timeout_ms
            .map_or(default_poll_timeout, Duration::from_millis);
        let batch_rows = spec.batch_rows.unwrap_or(default_batch_rows);
        let schema = spec.declared_schema();
        Self {
            spec,
            client,
            schema,
            poll_timeout,
            batch_rows,
            pending: VecDeque::new(),
            opened: false,
        }
    }

    /// 소스 식별자를 반환합니다.
    pub fn origin(&self) -> String {
        format!("stream:{}", self.spec.topic)
    }

    /// 소스를 준비합니다. 스트림은 구독 외 준비 작업이 없습니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        tracing::debug!(origin = %self.origin(), "stream source opened");
        self.opened = true;
        Ok(())
    }

    /// 페이로드 한 건을 선언된 스키마 폭의 문자열 행으로 나눕니다.
    ///
    /// 부족한 필드는 `Null`로 채우고 초과분은 잘립니다. 행 유효성은
    /// dtype 강제 이후 정책으로 판정됩니다.
    fn split_payload(&self, record: &RawRecord) -> Vec<Value> {
        let delimiter = self.spec.delimiter_byte() as char;
        let payload = record.payload_str();
        let mut row: Vec<Value> = payload
            .trim_end_matches(['\r', '\n'])
            .split(delimiter)
            .take(self.schema.width())
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Str(cell.to_owned())
                }
            })
            .collect();
        row.resize(self.schema.width(), Value::Null);
        row
    }

    /// 다음 배치를 가져옵니다. 타임아웃 시 빈 프레임을 반환합니다.
    pub async fn next_batch(&mut self) -> Result<Option<SourceBatch>, WorkflowError> {
        if !self.opened {
            return Err(WorkflowError::InvalidState(
                "stream source used before open".to_owned(),
            ));
        }

        if self.pending.is_empty() {
            let records = self
                .client
                .poll(self.poll_timeout)
                .await
                .map_err(|e| WorkflowError::Source {
                    origin: self.origin(),
                    reason: e.to_string(),
                })?;
            self.pending.extend(records);
        }

        let take = self.batch_rows.min(self.pending.len());
        let records: Vec<RawRecord> = self.pending.drain(..take).collect();
        let mut raw = Frame::empty(Schema::all_str(&self.spec.schema));
        for record in &records {
            raw.push_row(self.split_payload(record))?;
        }

        let (coerced, mut bad_rows) = raw.coerce_schema(&self.schema)?;
        let missing = required_violations(&coerced, &self.schema, &self.spec.required_cols)?;
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
                    "strict mode: {} message(s) violate the schema",
                    bad_rows.len()
                ),
            });
        }

        let rejected_rows = bad_rows.len() as u64;
        let frame = if rejected_rows > 0 {
            tracing::warn!(
                origin = %self.origin(),
                rejected = rejected_rows,
                "dropping messages that violate the source schema"
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

        metrics::counter!(SOURCE_BATCHES_TOTAL, LABEL_ADAPTER_KIND => "stream").increment(1);
        if rejected_rows > 0 {
            metrics::counter!(SOURCE_ROWS_REJECTED_TOTAL).increment(rejected_rows);
        }

        Ok(Some(SourceBatch {
            frame,
            rejected_rows,
        }))
    }

    /// 소스를 닫습니다.
    ///
    /// poll은 브로커에서 메시지를 꺼내므로, 배치 크기를 넘겨 이월된
    /// 메시지는 아직 싱크에 닿지 않았습니다. 토픽으로 되돌려 놓아야
    /// 정지 후 재개가 그 행들을 다시 받을 수 있습니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        let origin = self.origin();
        let requeued = self.pending.len();
        while let Some(record) = self.pending.pop_front() {
            if let Err(e) = self
                .client
                .publish(&self.spec.topic, record.payload.clone())
                .await
            {
                self.pending.push_front(record);
                return Err(WorkflowError::Source {
                    origin,
                    reason: format!("failed to requeue buffered message: {e}"),
                });
            }
        }
        if requeued > 0 {
            tracing::info!(origin = %origin, requeued, "returned buffered messages to topic");
        }
        self.opened = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use logsift_core::types::FieldType;
    use std::collections::BTreeMap;

    fn spec() -> StreamSourceSpec {
        StreamSourceSpec {
            topic: "events".to_owned(),
            input_format: "csv".to_owned(),
            delimiter: ",".to_owned(),
            schema: vec!["rule".to_owned(), "count".to_owned()],
            dtype: BTreeMap::from([("count".to_owned(), FieldType::Int)]),
            required_cols: vec!["rule".to_owned()],
            strict: false,
            poll_timeout_ms: Some(20),
            batch_rows: None,
        }
    }

    fn source_on(broker: &MemoryBroker) -> StreamSource {
        StreamSource::new(
            spec(),
            Box::new(broker.client("events")),
            Duration::from_millis(500),
            16,
        )
    }

    #[tokio::test]
    async fn polls_messages_into_typed_batch() {
        let broker = MemoryBroker::new();
        broker.seed("events", "ssh_brute,4");
        broker.seed("events", "dns_tunnel,9");

        let mut source = source_on(&broker);
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frame.num_rows(), 2);
        assert_eq!(batch.frame.row(0).unwrap()[1], Value::Int(4));
        assert_eq!(batch.rejected_rows, 0);
    }

    #[tokio::test]
    async fn timeout_yields_empty_batch_not_none() {
        let broker = MemoryBroker::new();
        let mut source = source_on(&broker);
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert!(batch.frame.is_empty());
    }

    #[tokio::test]
    async fn short_payload_padded_and_required_enforced() {
        let broker = MemoryBroker::new();
        broker.seed("events", "ssh_brute");
        broker.seed("events", ",7");

        let mut source = source_on(&broker);
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        // 첫 메시지: count 결측이지만 필수 아님 → 유지
        // 둘째 메시지: 필수 컬럼 rule 결측 → 드롭
        assert_eq!(batch.frame.num_rows(), 1);
        assert_eq!(batch.frame.row(0).unwrap()[1], Value::Null);
        assert_eq!(batch.rejected_rows, 1);
    }

    #[tokio::test]
    async fn oversized_poll_carries_over() {
        let broker = MemoryBroker::new();
        for i in 0..5 {
            broker.seed("events", format!("r{i},{i}"));
        }

        let mut source = StreamSource::new(
            spec(),
            Box::new(broker.client("events")),
            Duration::from_millis(500),
            3,
        );
        source.open().await.unwrap();

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.frame.num_rows(), 3);
        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!(second.frame.num_rows(), 2);
    }

    #[tokio::test]
    async fn close_returns_buffered_messages_to_topic() {
        let broker = MemoryBroker::new();
        for i in 0..5 {
            broker.seed("events", format!("r{i},{i}"));
        }

        let mut source = StreamSource::new(
            spec(),
            Box::new(broker.client("events")),
            Duration::from_millis(500),
            3,
        );
        source.open().await.unwrap();

        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frame.num_rows(), 3);

        // 이월된 2건은 싱크에 닿지 않았다 — 닫으면 토픽으로 돌아간다
        source.close().await.unwrap();
        assert_eq!(broker.depth("events"), 2);
    }

    #[tokio::test]
    async fn strict_mode_rejects_batch() {
        let broker = MemoryBroker::new();
        broker.seed("events", "ok,not-a-number");

        let mut spec = spec();
        spec.strict = true;
        let mut source = StreamSource::new(
            spec,
            Box::new(broker.client("events")),
            Duration::from_millis(500),
            16,
        );
        source.open().await.unwrap();

        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Source { .. }));
    }
}
