use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logsift_core::config::{GeneralConfig, LogsiftConfig};
use logsift_workflow::{Checkpoint, Workflow, WorkflowConfig, WorkflowState};

/// Logsift CLI — 텔레메트리 워크플로우 명령줄 도구
#[derive(Parser)]
#[command(name = "logsift", version, about)]
struct Cli {
    /// 엔진 설정 파일 경로 (없으면 기본값 사용)
    #[arg(short, long, default_value = "logsift.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 워크플로우 정의 파일을 검증
    Validate {
        /// 워크플로우 TOML 경로
        workflow: PathBuf,
    },
    /// 워크플로우 실행
    Run {
        /// 워크플로우 TOML 경로
        workflow: PathBuf,
        /// 체크포인트 파일 경로 — 있으면 재개하고, 종료 시 갱신
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let engine_config = if Path::new(&cli.config).exists() {
        LogsiftConfig::load(&cli.config)
            .await
            .with_context(|| format!("failed to load {}", cli.config))?
    } else {
        LogsiftConfig::default()
    };
    init_tracing(&engine_config.general);

    match cli.command {
        Commands::Validate { workflow } => {
            let config = WorkflowConfig::from_file(&workflow)
                .await
                .with_context(|| format!("invalid workflow {}", workflow.display()))?;
            println!("✓ workflow '{}' is valid", config.name);
            println!("  source:      {}", config.source.origin());
            println!("  destination: {}", config.destination.destination());
            println!("  stages:      {}", config.stages.len());
        }
        Commands::Run {
            workflow,
            checkpoint,
        } => {
            run_workflow(&workflow, checkpoint.as_deref(), engine_config).await?;
        }
    }

    Ok(())
}

/// 전역 tracing 구독자를 초기화합니다.
///
/// `RUST_LOG`가 있으면 설정 파일의 로그 레벨보다 우선합니다. 로그 형식은
/// 설정 로드 시 이미 json/pretty로 검증되어 있습니다.
fn init_tracing(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if general.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

async fn run_workflow(
    workflow_path: &Path,
    checkpoint_path: Option<&Path>,
    engine_config: LogsiftConfig,
) -> Result<()> {
    let config = WorkflowConfig::from_file(workflow_path)
        .await
        .with_context(|| format!("invalid workflow {}", workflow_path.display()))?;

    if config.source.is_stream() || matches!(config.destination, logsift_workflow::SinkSpec::Stream(_)) {
        anyhow::bail!(
            "stream endpoints require a broker client and can only be run embedded; \
             the CLI runs file workflows"
        );
    }

    let resume = load_checkpoint(checkpoint_path)?;
    let mut workflow = Workflow::builder(config)
        .engine(engine_config.engine)
        .resume_from(resume)
        .build()
        .context("failed to build workflow")?;
    let handle = workflow.stop_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, stopping at batch boundary");
            handle.cancel();
        }
    });

    let report = workflow.run().await.context("workflow run failed")?;

    if let Some(path) = checkpoint_path {
        let json = serde_json::to_string_pretty(&report.checkpoint)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
    }

    println!("workflow '{}' finished: {:?}", report.workflow, report.state);
    println!("  rows emitted:  {}", report.rows_emitted);
    println!("  rows rejected: {}", report.rows_rejected);
    println!(
        "  checkpoint:    {} rows / {} batches",
        report.checkpoint.rows, report.checkpoint.batches
    );
    for (stage, stats) in &report.stage_stats {
        println!(
            "  stage {stage}: in={} out={} dropped={} parse_failures={}",
            stats.rows_in, stats.rows_out, stats.rows_dropped, stats.parse_failures
        );
    }

    match report.state {
        WorkflowState::Failed => {
            anyhow::bail!(
                "workflow failed: {}",
                report.failure.unwrap_or_else(|| "unknown".to_owned())
            )
        }
        _ => Ok(()),
    }
}

fn load_checkpoint(path: Option<&Path>) -> Result<Checkpoint> {
    let Some(path) = path else {
        return Ok(Checkpoint::start());
    };
    if !path.exists() {
        return Ok(Checkpoint::start());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
    let checkpoint: Checkpoint = serde_json::from_str(&content)
        .with_context(|| format!("malformed checkpoint {}", path.display()))?;
    tracing::info!(rows = checkpoint.rows, batches = checkpoint.batches, "resuming from checkpoint");
    Ok(checkpoint)
}
