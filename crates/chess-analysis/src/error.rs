//! Error types for engine communication and game analysis.

use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineState;

/// Errors raised by a single engine process and its protocol stream.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process.
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    /// The engine did not complete the UCI handshake.
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    /// No terminal response arrived within the request budget.
    #[error("Engine did not answer within {0:?}")]
    Timeout(Duration),
    /// The engine closed its stream or its pipe broke mid-request.
    #[error("Engine exited unexpectedly: {0}")]
    Crashed(String),
    /// The request was abandoned because the engine is shutting down.
    #[error("Engine request cancelled")]
    Cancelled,
    /// A request was submitted while the engine was not idle.
    #[error("Engine is not ready (state: {0})")]
    NotReady(EngineState),
}

/// Terminal errors of a game analysis.
///
/// Any error aborts the whole analysis; there are no partial results.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The game notation could not be parsed or replayed.
    #[error("Invalid game notation: {0}")]
    InvalidInput(String),
    /// The engine process could not be spawned or initialized.
    #[error("Engine failed to start: {0}")]
    EngineStartFailure(String),
    /// The engine did not answer a request within its budget.
    #[error("Engine timed out after {0:?}")]
    EngineTimeout(Duration),
    /// The engine exited while a request was outstanding.
    #[error("Engine crashed: {0}")]
    EngineCrashed(String),
    /// The move sequence did not match the positions it was paired with.
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
    /// The caller cancelled the analysis.
    #[error("Analysis cancelled")]
    Cancelled,
    /// The engine pool refused admission because its wait queue is full.
    #[error("Engine pool saturated: {0} requests already waiting")]
    PoolSaturated(usize),
}

impl From<EngineError> for AnalysisError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Spawn(_) | EngineError::Handshake(_) => {
                AnalysisError::EngineStartFailure(err.to_string())
            }
            EngineError::Timeout(budget) => AnalysisError::EngineTimeout(budget),
            EngineError::Crashed(reason) => AnalysisError::EngineCrashed(reason),
            EngineError::Cancelled => AnalysisError::Cancelled,
            EngineError::NotReady(_) => AnalysisError::InternalInconsistency(err.to_string()),
        }
    }
}
