//! Analysis Worker - Analyses chess games move by move.
//!
//! Reads PGN files, evaluates every move with a pool of UCI engines, and
//! writes one JSON report per game with centipawn losses, phase summaries,
//! collapse events and the overall classification level.
//!
//! Logging is controlled with `RUST_LOG` (default `info`) and goes to
//! stderr, so reports printed to stdout stay machine-readable.

mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chess_analysis::{AnalysisConfig, Analyzer, EnginePool};
use clap::Parser;
use runner::JobRunner;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Analysis Worker - Analyses PGN games with a UCI engine.
#[derive(Parser, Debug)]
#[command(name = "analysis-worker")]
#[command(about = "Analyses PGN games move by move with a UCI engine")]
struct Args {
    /// PGN files to analyse, one game per file
    #[arg(required = true)]
    pgn: Vec<PathBuf>,

    /// Path to TOML configuration file
    #[arg(long, default_value = "analysis.toml")]
    config: PathBuf,

    /// Engine executable (overrides the config file)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Search depth (overrides the config file)
    #[arg(long)]
    depth: Option<u32>,

    /// Number of engine processes (overrides the config file)
    #[arg(long)]
    pool_size: Option<usize>,

    /// Directory for JSON reports; reports go to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(engine) = &self.engine {
            config.engine.path = engine.clone();
        }
        if let Some(depth) = self.depth {
            config.engine.depth = depth;
        }
        if let Some(size) = self.pool_size {
            config.pool.size = size;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = AnalysisConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply_overrides(&mut config);
    config.validate()?;

    tracing::info!("Starting analysis-worker");
    tracing::info!("Engine: {:?}", config.engine.path);
    tracing::info!("Depth: {}", config.engine.depth);
    tracing::info!("Pool size: {}", config.pool.size);
    tracing::info!("Games: {}", args.pgn.len());

    let pool = EnginePool::new(config.engine.clone(), &config.pool);
    let analyzer = Arc::new(Analyzer::new(Arc::clone(&pool)));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            on_signal.cancel();
        }
    });

    let runner = JobRunner::new(analyzer, args.output.clone());
    let reports = runner.run_all(&args.pgn, &cancel).await;
    pool.shutdown().await;
    let reports = reports?;

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    tracing::info!(
        "Worker finished: {} completed, {} failed",
        reports.len() - failed,
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} of {} analyses failed", failed, reports.len());
    }
    Ok(())
}
