//! 메시지 스트림 싱크
//!
//! 배치의 각 행을 구분자 레코드 페이로드로 렌더링해 토픽에 발행합니다.
//! 발행 실패는 지수 백오프로 재시도되고, 소진되면 배치 실패로
//! 승격됩니다. 이미 발행된 행은 되돌리지 않습니다 — 다운스트림은
//! at-least-once를 가정해야 합니다.

use bytes::Bytes;

use logsift_core::frame::Frame;
use logsift_core::metrics::{LABEL_ADAPTER_KIND, SINK_BATCHES_TOTAL, SINK_RETRIES_TOTAL};
use logsift_core::pipeline::MessageClient;
use logsift_core::types::Value;

use crate::config::StreamSinkSpec;
use crate::error::WorkflowError;
use crate::sink::RetryPolicy;

/// 브로커 토픽에 발행하는 싱크
pub struct StreamSink {
    spec: StreamSinkSpec,
    client: Box<dyn MessageClient>,
    retry: RetryPolicy,
}

impl StreamSink {
    /// 스펙, 브로커 클라이언트, 재시도 정책으로 싱크를 생성합니다.
    pub fn new(spec: StreamSinkSpec, client: Box<dyn MessageClient>, retry: RetryPolicy) -> Self {
        Self {
            spec,
            client,
            retry,
        }
    }

    /// 싱크 식별자를 반환합니다.
    pub fn destination(&self) -> String {
        format!("stream:{}", self.spec.topic)
    }

    /// 싱크를 준비합니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        tracing::debug!(destination = %self.destination(), "stream sink opened");
        Ok(())
    }

    /// 행 하나를 구분자 페이로드로 렌더링합니다.
    fn render_row(&self, row: &[Value]) -> Bytes {
        let delimiter = self
            .spec
            .delimiter
            .chars()
            .next()
            .unwrap_or(',')
            .to_string();
        let rendered: Vec<String> = row.iter().map(Value::render).collect();
        Bytes::from(rendered.join(&delimiter))
    }

    /// 페이로드 하나를 재시도 정책에 따라 발행합니다.
    async fn publish_with_retry(&mut self, payload: Bytes) -> Result<(), WorkflowError> {
        let mut last_reason = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.client.publish(&self.spec.topic, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_reason = e.to_string();
                    if attempt < self.retry.max_attempts {
                        metrics::counter!(SINK_RETRIES_TOTAL).increment(1);
                        tracing::warn!(
                            destination = %self.destination(),
                            attempt,
                            reason = %last_reason,
                            "publish failed, retrying"
                        );
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }
        Err(WorkflowError::Sink {
            destination: self.destination(),
            attempts: self.retry.max_attempts,
            reason: last_reason,
        })
    }

    /// 배치의 각 행을 발행합니다.
    pub async fn write(&mut self, frame: &Frame) -> Result<(), WorkflowError> {
        for row in frame.rows() {
            let payload = self.render_row(row);
            self.publish_with_retry(payload).await?;
        }
        if !frame.is_empty() {
            metrics::counter!(SINK_BATCHES_TOTAL, LABEL_ADAPTER_KIND => "stream").increment(1);
        }
        Ok(())
    }

    /// 싱크를 닫습니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use logsift_core::types::Schema;
    use std::time::Duration;

    fn spec() -> StreamSinkSpec {
        StreamSinkSpec {
            topic: "scored".to_owned(),
            output_format: "csv".to_owned(),
            delimiter: ",".to_owned(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1),
        }
    }

    fn sample_frame() -> Frame {
        Frame::from_rows(
            Schema::all_str(&["rule", "count"]),
            vec![
                vec![Value::Str("a".to_owned()), Value::Str("1".to_owned())],
                vec![Value::Null, Value::Str("2".to_owned())],
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publishes_each_row_as_payload() {
        let broker = MemoryBroker::new();
        let mut sink = StreamSink::new(spec(), Box::new(broker.client("scored")), fast_retry());
        sink.open().await.unwrap();
        sink.write(&sample_frame()).await.unwrap();

        let messages = broker.drain("scored");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Bytes::from_static(b"a,1"));
        // Null은 빈 필드로 렌더링
        assert_eq!(messages[1], Bytes::from_static(b",2"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes(2);

        let mut sink = StreamSink::new(spec(), Box::new(broker.client("scored")), fast_retry());
        sink.write(&sample_frame()).await.unwrap();
        assert_eq!(broker.depth("scored"), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_batch() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes(10);

        let mut sink = StreamSink::new(spec(), Box::new(broker.client("scored")), fast_retry());
        let err = sink.write(&sample_frame()).await.unwrap_err();
        match err {
            WorkflowError::Sink { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected sink error, got {other:?}"),
        }
    }
}
