//! 싱크 어댑터 — 처리된 배치를 목적지에 기록
//!
//! 소스와 마찬가지로 싱크 종류도 설정의 태그드 배리언트로 구성 시점에
//! 결정됩니다. 일시 장애는 지수 백오프로 제한 횟수만큼 재시도하고,
//! 소진되면 배치 실패로 승격됩니다. 체크포인트는 싱크 쓰기가 성공한
//! 뒤에만 전진하므로 재시도 소진은 곧 해당 배치의 비반영을 뜻합니다.

pub mod file;
pub mod stream;

pub use file::FileSink;
pub use stream::StreamSink;

use std::time::Duration;

use logsift_core::frame::Frame;

use crate::error::WorkflowError;

/// 싱크 재시도 정책
///
/// 시도 간 대기 시간은 `backoff_base * 2^(attempt-1)`입니다
/// (기본 50ms → 50, 100, 200...).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// `attempt`번째 실패 후의 대기 시간을 계산합니다 (1 기반).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(50),
        }
    }
}

/// 싱크 어댑터 열거 디스패치
pub enum SinkAdapter {
    /// 파일 시스템 싱크
    File(FileSink),
    /// 메시지 스트림 싱크
    Stream(StreamSink),
}

impl SinkAdapter {
    /// 목적지를 준비합니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        match self {
            Self::File(sink) => sink.open().await,
            Self::Stream(sink) => sink.open().await,
        }
    }

    /// 배치를 기록합니다. 일시 장애는 정책에 따라 재시도됩니다.
    pub async fn write(&mut self, frame: &Frame) -> Result<(), WorkflowError> {
        match self {
            Self::File(sink) => sink.write(frame).await,
            Self::Stream(sink) => sink.write(frame).await,
        }
    }

    /// 싱크를 닫고 버퍼를 비웁니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        match self {
            Self::File(sink) => sink.close().await,
            Self::Stream(sink) => sink.close().await,
        }
    }

    /// 싱크 식별자를 반환합니다 (로깅/에러용).
    pub fn destination(&self) -> String {
        match self {
            Self::File(sink) => sink.destination(),
            Self::Stream(sink) => sink.destination(),
        }
    }
}
