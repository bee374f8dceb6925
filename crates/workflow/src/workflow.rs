//! 워크플로우 실행 엔진
//!
//! [`Workflow`]는 소스 → 단계 체인 → 싱크의 배치 루프를 상태 기계로
//! 구동합니다. 상태 전이는 다음과 같습니다:
//!
//! ```text
//! Created ──run()──▶ Running ──소스 소진──▶ Completed
//!                       │ ├──정지 요청──▶ Stopped
//!                       └──치명적 실패──▶ Failed
//! ```
//!
//! 체크포인트는 배치가 싱크 쓰기까지 성공한 뒤에만 전진합니다.
//! 정지 요청은 배치 경계에서만 확인되므로, 처리 중인 배치는 끝까지
//! 완료되고 절반만 반영된 배치는 생기지 않습니다.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use logsift_core::config::EngineConfig;
use logsift_core::metrics::{
    LABEL_WORKFLOW, WORKFLOW_BATCHES_TOTAL, WORKFLOW_BATCH_DURATION_SECONDS, WORKFLOW_ROWS_TOTAL,
};
use logsift_core::pipeline::MessageClient;
use logsift_core::pipeline::RecordParser;

use crate::checkpoint::Checkpoint;
use crate::config::{SinkSpec, SourceSpec, WorkflowConfig};
use crate::error::WorkflowError;
use crate::parser::ParserRegistry;
use crate::sink::{FileSink, RetryPolicy, SinkAdapter, StreamSink};
use crate::source::{FileSource, SourceAdapter, StreamSource};
use crate::stage::{build_stages, Stage, StageStats};

/// 워크플로우 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// 생성됨, 아직 실행 전
    Created,
    /// 실행 중
    Running,
    /// 소스 소진까지 정상 완료 (유한 소스만)
    Completed,
    /// 정지 요청으로 배치 경계에서 중단
    Stopped,
    /// 치명적 실패로 중단
    Failed,
}

/// 실행 결과 보고서
///
/// 실패한 실행도 보고서를 남깁니다 — 마지막 체크포인트와 실패 맥락이
/// 재시작 판단의 근거가 됩니다.
#[derive(Debug)]
pub struct RunReport {
    /// 워크플로우 이름
    pub workflow: String,
    /// 종료 상태
    pub state: WorkflowState,
    /// 마지막으로 싱크까지 반영된 위치
    pub checkpoint: Checkpoint,
    /// 싱크에 기록된 행 수
    pub rows_emitted: u64,
    /// 소스 유효성 정책으로 거부된 행 수
    pub rows_rejected: u64,
    /// 단계별 행 수지 (단계 이름, 수지)
    pub stage_stats: Vec<(String, StageStats)>,
    /// 치명적 실패의 맥락 (Failed 상태에서만)
    pub failure: Option<String>,
}

/// 배치 워크플로우 엔진
pub struct Workflow {
    name: String,
    state: WorkflowState,
    source: SourceAdapter,
    sink: SinkAdapter,
    stages: Vec<Stage>,
    checkpoint: Checkpoint,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("stages", &self.stages)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// 빌더를 시작합니다.
    pub fn builder(config: WorkflowConfig) -> WorkflowBuilder {
        WorkflowBuilder::new(config)
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// 현재 체크포인트를 반환합니다.
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// 정지 핸들을 반환합니다.
    ///
    /// 핸들의 `cancel()`은 협조적 정지 요청입니다. 엔진은 배치 경계에서
    /// 요청을 확인하고 현재 배치를 끝까지 완료한 뒤 멈춥니다.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 워크플로우를 실행합니다.
    ///
    /// `Created` 상태에서만 호출할 수 있습니다. 치명적 실패는 에러가
    /// 아니라 `Failed` 상태의 보고서로 반환됩니다 — 마지막 체크포인트가
    /// 함께 보고되어야 하기 때문입니다.
    pub async fn run(&mut self) -> Result<RunReport, WorkflowError> {
        if self.state != WorkflowState::Created {
            return Err(WorkflowError::InvalidState(format!(
                "workflow '{}' has already run (state: {:?})",
                self.name, self.state
            )));
        }
        self.state = WorkflowState::Running;
        tracing::info!(workflow = %self.name, origin = %self.source.origin(), "workflow started");

        let mut rows_emitted = 0u64;
        let mut rows_rejected = 0u64;
        let mut stage_stats = vec![StageStats::default(); self.stages.len()];

        let outcome = self
            .run_loop(&mut rows_emitted, &mut rows_rejected, &mut stage_stats)
            .await;

        if let Err(e) = self.source.close().await {
            tracing::warn!(workflow = %self.name, error = %e, "source close failed");
        }
        if let Err(e) = self.sink.close().await {
            tracing::warn!(workflow = %self.name, error = %e, "sink close failed");
        }

        let (state, failure) = match outcome {
            Ok(state) => (state, None),
            Err(e) => {
                tracing::error!(workflow = %self.name, error = %e, "workflow failed");
                (WorkflowState::Failed, Some(e.to_string()))
            }
        };
        self.state = state;
        tracing::info!(
            workflow = %self.name,
            state = ?state,
            rows_emitted,
            batches = self.checkpoint.batches,
            "workflow finished"
        );

        Ok(RunReport {
            workflow: self.name.clone(),
            state,
            checkpoint: self.checkpoint,
            rows_emitted,
            rows_rejected,
            stage_stats: self
                .stages
                .iter()
                .map(|s| s.name().to_owned())
                .zip(stage_stats)
                .collect(),
            failure,
        })
    }

    async fn run_loop(
        &mut self,
        rows_emitted: &mut u64,
        rows_rejected: &mut u64,
        stage_stats: &mut [StageStats],
    ) -> Result<WorkflowState, WorkflowError> {
        self.source.open().await?;
        self.sink.open().await?;

        loop {
            // 정지 요청은 배치 경계에서만 확인
            if self.cancel.is_cancelled() {
                tracing::info!(workflow = %self.name, "stop requested, halting at batch boundary");
                return Ok(WorkflowState::Stopped);
            }

            let Some(batch) = self.source.next_batch().await? else {
                return Ok(WorkflowState::Completed);
            };
            *rows_rejected += batch.rejected_rows;

            let source_rows = batch.frame.num_rows() as u64;
            if source_rows == 0 {
                // 스트림 poll 타임아웃 — 정지 확인 후 계속
                continue;
            }

            let started = Instant::now();
            let mut frame = batch.frame;
            for (stage, stats) in self.stages.iter_mut().zip(stage_stats.iter_mut()) {
                frame = stage.apply(frame, stats)?;
            }

            self.sink.write(&frame).await?;
            *rows_emitted += frame.num_rows() as u64;

            // 싱크 반영이 끝난 뒤에만 전진
            self.checkpoint.advance(source_rows);

            metrics::counter!(WORKFLOW_BATCHES_TOTAL, LABEL_WORKFLOW => self.name.clone())
                .increment(1);
            metrics::counter!(WORKFLOW_ROWS_TOTAL, LABEL_WORKFLOW => self.name.clone())
                .increment(source_rows);
            metrics::histogram!(WORKFLOW_BATCH_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            tracing::debug!(
                workflow = %self.name,
                batch = self.checkpoint.batches,
                rows_in = source_rows,
                rows_out = frame.num_rows(),
                "batch committed"
            );
        }
    }
}

/// 워크플로우 빌더
///
/// 설정과 코드 제공 의존성 (브로커 클라이언트, 커스텀 파서)을 모아
/// 어댑터와 단계 체인을 배선합니다. 스트림 엔드포인트가 설정에 있는데
/// 클라이언트가 없으면 구성이 실패합니다.
pub struct WorkflowBuilder {
    config: WorkflowConfig,
    engine: EngineConfig,
    checkpoint: Checkpoint,
    registry: ParserRegistry,
    source_client: Option<Box<dyn MessageClient>>,
    sink_client: Option<Box<dyn MessageClient>>,
    extra_stages: Vec<Stage>,
    cancel: CancellationToken,
}

impl WorkflowBuilder {
    /// 설정으로 빌더를 생성합니다.
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            engine: EngineConfig::default(),
            checkpoint: Checkpoint::start(),
            registry: ParserRegistry::new(),
            source_client: None,
            sink_client: None,
            extra_stages: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// 외부에서 공유하는 정지 토큰을 지정합니다.
    ///
    /// 지정하지 않으면 워크플로우가 자체 토큰을 만들고
    /// [`Workflow::stop_handle`]로 노출합니다.
    pub fn stop_signal(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 엔진 공통 설정을 지정합니다.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// 이전 실행의 체크포인트에서 재개합니다.
    pub fn resume_from(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// 커스텀 파서를 등록합니다.
    pub fn register_parser(mut self, parser: Box<dyn RecordParser>) -> Self {
        self.registry = self.registry.register(parser);
        self
    }

    /// 스트림 소스용 브로커 클라이언트를 지정합니다.
    pub fn source_client(mut self, client: Box<dyn MessageClient>) -> Self {
        self.source_client = Some(client);
        self
    }

    /// 스트림 싱크용 브로커 클라이언트를 지정합니다.
    pub fn sink_client(mut self, client: Box<dyn MessageClient>) -> Self {
        self.sink_client = Some(client);
        self
    }

    /// 설정 단계 뒤에 붙는 커스텀 단계를 추가합니다.
    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// 워크플로우를 구성합니다.
    pub fn build(mut self) -> Result<Workflow, WorkflowError> {
        self.config.validate()?;

        let source = match &self.config.source {
            SourceSpec::Fs(spec) => SourceAdapter::File(FileSource::new(
                spec.clone(),
                self.engine.max_batch_rows,
                self.checkpoint,
            )),
            SourceSpec::Stream(spec) => {
                let client = self.source_client.take().ok_or_else(|| {
                    WorkflowError::config(
                        "source",
                        "stream source requires a broker client",
                    )
                })?;
                SourceAdapter::Stream(StreamSource::new(
                    spec.clone(),
                    client,
                    Duration::from_millis(self.engine.poll_timeout_ms),
                    self.engine.max_batch_rows,
                ))
            }
        };

        let retry = RetryPolicy {
            max_attempts: self.engine.sink_max_attempts,
            backoff_base: Duration::from_millis(self.engine.sink_backoff_base_ms),
        };
        let sink = match &self.config.destination {
            SinkSpec::Fs(spec) => SinkAdapter::File(FileSink::new(
                spec.clone(),
                retry,
                !self.checkpoint.is_start(),
            )),
            SinkSpec::Stream(spec) => {
                let client = self.sink_client.take().ok_or_else(|| {
                    WorkflowError::config(
                        "destination",
                        "stream destination requires a broker client",
                    )
                })?;
                SinkAdapter::Stream(StreamSink::new(spec.clone(), client, retry))
            }
        };

        let mut stages = build_stages(&self.config.stages, &mut self.registry)?;
        stages.extend(self.extra_stages);

        Ok(Workflow {
            name: self.config.name.clone(),
            state: WorkflowState::Created,
            source,
            sink,
            stages,
            checkpoint: self.checkpoint,
            cancel: self.cancel,
        })
    }
}
