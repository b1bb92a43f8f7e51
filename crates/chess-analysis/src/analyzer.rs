//! Whole-game analysis on top of the engine pool.
//!
//! The [`Analyzer`] ties the pieces together: read the PGN, check out an
//! engine, run the [`EvaluationPipeline`], and reduce the evaluated moves
//! with the [`MetricsEngine`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::error::AnalysisError;
use crate::game::{parse_pgn, GameMove};
use crate::job::{AnalysisJob, TransitionError};
use crate::metrics::{AnalysisResult, MetricsEngine};
use crate::pipeline::EvaluationPipeline;
use crate::pool::{EngineLauncher, EnginePool, ProcessLauncher};

/// Analyses games using engines from a shared pool.
pub struct Analyzer<L: EngineLauncher = ProcessLauncher> {
    pool: Arc<EnginePool<L>>,
    metrics: MetricsEngine,
}

impl<L: EngineLauncher> Analyzer<L> {
    pub fn new(pool: Arc<EnginePool<L>>) -> Self {
        Self {
            pool,
            metrics: MetricsEngine,
        }
    }

    pub fn pool(&self) -> &Arc<EnginePool<L>> {
        &self.pool
    }

    /// Analyses a PGN game record.
    ///
    /// The PGN is fully parsed and validated before an engine is requested,
    /// so malformed input never occupies a pool slot.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InvalidInput`] for unreadable PGN, otherwise any
    /// error of [`analyze_moves`](Self::analyze_moves).
    pub async fn analyze_pgn(
        &self,
        pgn: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let game = parse_pgn(pgn)?;
        self.analyze_moves(&game.moves, cancel).await
    }

    /// Analyses an already validated move list.
    ///
    /// An engine that took part in a failed analysis is stopped rather than
    /// returned to the pool.
    ///
    /// # Errors
    ///
    /// Pool admission errors ([`AnalysisError::PoolSaturated`]), engine
    /// failures, [`AnalysisError::InternalInconsistency`] and
    /// [`AnalysisError::Cancelled`].
    pub async fn analyze_moves(
        &self,
        moves: &[GameMove],
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut engine = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            engine = self.pool.checkout() => engine?,
        };

        let pipeline = EvaluationPipeline::new(cancel.clone());
        match pipeline.run(&mut engine, moves).await {
            Ok(evaluated) => {
                drop(engine);
                Ok(self.metrics.compute(evaluated))
            }
            Err(err) => {
                engine.discard().await;
                Err(err)
            }
        }
    }

    /// Runs a pending job to completion.
    ///
    /// The job ends up `completed` with its result or `failed` with the
    /// error message; analysis errors are recorded on the job, not returned.
    ///
    /// # Errors
    ///
    /// [`TransitionError`] if the job was not pending.
    pub async fn run_job(
        &self,
        job: &mut AnalysisJob,
        cancel: &CancellationToken,
    ) -> Result<(), TransitionError> {
        job.start()?;
        let span = info_span!("job", id = %job.id);

        let outcome = async {
            info!("analysis started");
            let game = parse_pgn(&job.pgn)?;
            job.headers = game.headers;
            self.analyze_moves(&game.moves, cancel).await
        }
        .instrument(span.clone())
        .await;

        let _entered = span.enter();
        match outcome {
            Ok(result) => {
                info!(
                    moves = result.moves.len(),
                    average_loss = result.average_loss,
                    level = %result.classification.label(),
                    "analysis completed"
                );
                job.complete(result)
            }
            Err(err) => {
                warn!(error = %err, "analysis failed");
                job.fail(err.to_string())
            }
        }
    }
}
