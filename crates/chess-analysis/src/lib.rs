//! Move-by-move chess game analysis with a UCI engine.
//!
//! This crate evaluates every move of a game with an external engine such as
//! Stockfish and turns the evaluations into quality metrics: centipawn loss,
//! accuracy, flow stability, pattern-match rate, per-phase summaries,
//! collapse events and an overall classification level.
//!
//! # Overview
//!
//! - [`EngineClient`] - One engine process behind a request/response API
//! - [`EnginePool`] - Bounded set of reusable engines with FIFO admission
//! - [`EvaluationPipeline`] - Evaluates each move before and after it is played
//! - [`MetricsEngine`] - Derives statistics from the evaluated moves
//! - [`Analyzer`] - PGN in, [`AnalysisResult`] out
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisConfig, Analyzer, EnginePool};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = AnalysisConfig::load("analysis.toml".as_ref())?;
//! let analyzer = Analyzer::new(EnginePool::new(config.engine, &config.pool));
//! let result = analyzer.analyze_pgn(pgn, &CancellationToken::new()).await?;
//! println!("{} ({:.1} average loss)", result.classification.label(), result.average_loss);
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod job;
pub mod level;
pub mod metrics;
pub mod notation;
pub mod pipeline;
pub mod pool;

#[cfg(test)]
mod test_support;

pub use analyzer::Analyzer;
pub use config::{AnalysisConfig, ConfigError, EngineConfig, PoolConfig};
pub use engine::{EngineClient, EngineState, PositionEvaluator};
pub use error::{AnalysisError, EngineError};
pub use evaluation::{score_to_centipawns, PositionEvaluation};
pub use game::{parse_pgn, GameMove, ParsedGame, Side};
pub use job::{AnalysisJob, JobStatus, TransitionError};
pub use level::{classify, MLevel, M_LEVELS};
pub use metrics::{AnalysisResult, CollapseEvent, MetricsEngine, PhaseSummary, Phases};
pub use notation::{moves_match, CanonicalMove};
pub use pipeline::{EvaluatedMove, EvaluationPipeline};
pub use pool::{EngineLauncher, EnginePool, PooledEngine, ProcessLauncher};
