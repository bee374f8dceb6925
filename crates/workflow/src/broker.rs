//! 인메모리 토픽 브로커 — 스트림 어댑터용 로컬 엔드포인트
//!
//! [`MemoryBroker`]는 [`MessageClient`] 계약의 참조 구현입니다.
//! 테스트와 로컬 배선에서 외부 브로커 없이 스트림 소스/싱크를
//! 구동할 수 있게 합니다. 구체 브로커 클라이언트 (Kafka 등)는 같은
//! trait을 구현하여 교체됩니다.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use logsift_core::error::WorkflowFault;
use logsift_core::pipeline::MessageClient;
use logsift_core::types::RawRecord;

/// poll 재확인 주기 — 타임아웃까지 이 간격으로 큐를 다시 확인합니다.
const POLL_TICK: Duration = Duration::from_millis(10);

/// 토픽별 메시지 큐를 가진 인메모리 브로커
///
/// `Clone`은 같은 브로커에 대한 핸들을 복제합니다. 여러 클라이언트가
/// 같은 브로커를 공유할 수 있지만, 각 클라이언트는 자기 워크플로우가
/// 배타적으로 소유합니다.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    topics: Arc<Mutex<HashMap<String, VecDeque<Bytes>>>>,
    /// 주입된 발행 실패 잔여 횟수 (일시 장애 시뮬레이션)
    publish_failures: Arc<Mutex<u32>>,
}

impl MemoryBroker {
    /// 새 브로커를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 토픽을 구독하는 클라이언트를 생성합니다.
    pub fn client(&self, topic: impl Into<String>) -> MemoryClient {
        MemoryClient {
            broker: self.clone(),
            topic: topic.into(),
        }
    }

    /// 토픽에 메시지를 직접 넣습니다 (테스트 피드용).
    pub fn seed(&self, topic: &str, payload: impl Into<Bytes>) {
        let mut topics = self.topics.lock().expect("broker lock poisoned");
        topics
            .entry(topic.to_owned())
            .or_default()
            .push_back(payload.into());
    }

    /// 토픽의 현재 메시지 수를 반환합니다.
    pub fn depth(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("broker lock poisoned");
        topics.get(topic).map_or(0, VecDeque::len)
    }

    /// 토픽의 모든 메시지를 꺼냅니다 (테스트 검증용).
    pub fn drain(&self, topic: &str) -> Vec<Bytes> {
        let mut topics = self.topics.lock().expect("broker lock poisoned");
        topics
            .get_mut(topic)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// 다음 `count`번의 발행을 실패시킵니다 (일시 장애 시뮬레이션).
    pub fn fail_next_publishes(&self, count: u32) {
        *self.publish_failures.lock().expect("broker lock poisoned") = count;
    }

    fn take_up_to(&self, topic: &str, max: usize) -> Vec<Bytes> {
        let mut topics = self.topics.lock().expect("broker lock poisoned");
        let Some(queue) = topics.get_mut(topic) else {
            return Vec::new();
        };
        let count = max.min(queue.len());
        queue.drain(..count).collect()
    }

    fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), WorkflowFault> {
        {
            let mut failures = self.publish_failures.lock().expect("broker lock poisoned");
            if *failures > 0 {
                *failures -= 1;
                return Err(WorkflowFault::Sink(format!(
                    "injected transient publish failure on topic '{topic}'"
                )));
            }
        }
        self.seed(topic, payload);
        Ok(())
    }
}

/// 한 토픽에 바인딩된 브로커 클라이언트
pub struct MemoryClient {
    broker: MemoryBroker,
    topic: String,
}

impl MemoryClient {
    /// 구독 중인 토픽 이름을 반환합니다.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl MessageClient for MemoryClient {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawRecord>, WorkflowFault> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let messages = self.broker.take_up_to(&self.topic, usize::MAX);
            if !messages.is_empty() {
                let origin = format!("stream:{}", self.topic);
                return Ok(messages
                    .into_iter()
                    .map(|payload| RawRecord::new(payload, origin.clone()))
                    .collect());
            }
            if tokio::time::Instant::now() >= deadline {
                // 타임아웃은 에러가 아니라 빈 배치
                return Ok(Vec::new());
            }
            tokio::time::sleep(POLL_TICK).await;
        }
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), WorkflowFault> {
        self.broker.try_publish(topic, payload)
    }
}
