//! 파일 시스템 싱크
//!
//! 배치를 구분자 형식 파일에 이어 씁니다. 헤더는 파일이 새로 만들어질
//! 때 한 번만 기록됩니다. 체크포인트에서 재개한 실행은 기존 출력을
//! 보존하고, 처음부터 시작한 실행은 파일을 새로 만듭니다.

use logsift_core::frame::Frame;
use logsift_core::metrics::{LABEL_ADAPTER_KIND, SINK_BATCHES_TOTAL, SINK_RETRIES_TOTAL};

use crate::config::FsSinkSpec;
use crate::error::WorkflowError;
use crate::sink::RetryPolicy;

/// 구분자 형식 파일에 기록하는 싱크
pub struct FileSink {
    spec: FsSinkSpec,
    retry: RetryPolicy,
    /// 재개 실행 여부 — false이면 첫 쓰기가 파일을 새로 만듭니다
    resume: bool,
    /// 이 싱크가 한 번이라도 쓰기를 수행했는지
    written: bool,
}

impl FileSink {
    /// 스펙과 재시도 정책으로 싱크를 생성합니다.
    ///
    /// `resume`이 true이면 기존 출력 파일 뒤에 이어 씁니다.
    pub fn new(spec: FsSinkSpec, retry: RetryPolicy, resume: bool) -> Self {
        Self {
            spec,
            retry,
            resume,
            written: false,
        }
    }

    /// 싱크 식별자를 반환합니다.
    pub fn destination(&self) -> String {
        format!("fs:{}", self.spec.output_path)
    }

    /// 출력 디렉터리가 존재하는지 확인합니다.
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        let path = std::path::Path::new(&self.spec.output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(WorkflowError::Sink {
                    destination: self.destination(),
                    attempts: 1,
                    reason: format!("output directory {} does not exist", parent.display()),
                });
            }
        }
        tracing::debug!(destination = %self.destination(), resume = self.resume, "file sink opened");
        Ok(())
    }

    /// 배치를 기록합니다.
    ///
    /// 빈 배치는 파일을 건드리지 않습니다 (스트림 타임아웃 배치가
    /// 빈 헤더 파일을 만들지 않도록).
    pub async fn write(&mut self, frame: &Frame) -> Result<(), WorkflowError> {
        if frame.is_empty() {
            return Ok(());
        }

        let append = self.resume || self.written;
        let mut last_reason = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match frame.write_delimited(&self.spec.output_path, self.spec.delimiter_byte(), append)
            {
                Ok(()) => {
                    self.written = true;
                    metrics::counter!(SINK_BATCHES_TOTAL, LABEL_ADAPTER_KIND => "fs").increment(1);
                    return Ok(());
                }
                Err(e) => {
                    last_reason = e.to_string();
                    if attempt < self.retry.max_attempts {
                        metrics::counter!(SINK_RETRIES_TOTAL).increment(1);
                        tracing::warn!(
                            destination = %self.destination(),
                            attempt,
                            reason = %last_reason,
                            "sink write failed, retrying"
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

    /// 싱크를 닫습니다. 쓰기는 배치마다 플러시되므로 추가 작업이 없습니다.
    pub async fn close(&mut self) -> Result<(), WorkflowError> {
        Ok(())
    }
}
