//! Pool of reusable analysis engines.
//!
//! At most `size` engine processes exist at once. They are started on
//! demand and handed from one game to the next; a semaphore admits callers
//! in FIFO order, and once `queue_capacity` callers are already waiting,
//! further ones are turned away with [`AnalysisError::PoolSaturated`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, PoolConfig};
use crate::engine::{EngineClient, EngineState, PositionEvaluator};
use crate::error::{AnalysisError, EngineError};
use crate::evaluation::PositionEvaluation;

/// Starts new engine clients for the pool.
pub trait EngineLauncher: Send + Sync + 'static {
    fn launch(&self) -> impl Future<Output = Result<EngineClient, EngineError>> + Send;
}

/// Launches engine processes from an [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: EngineConfig,
}

impl ProcessLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineLauncher for ProcessLauncher {
    async fn launch(&self) -> Result<EngineClient, EngineError> {
        EngineClient::spawn(&self.config).await
    }
}

/// Bounded set of engines shared by concurrent analyses.
pub struct EnginePool<L: EngineLauncher = ProcessLauncher> {
    launcher: L,
    idle: Mutex<Vec<EngineClient>>,
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    size: usize,
    queue_capacity: usize,
}

impl EnginePool<ProcessLauncher> {
    /// Create a pool of engine processes.
    ///
    /// # Arguments
    /// * `engine` - How to start and configure each engine process
    /// * `pool` - Pool size and wait-queue capacity
    pub fn new(engine: EngineConfig, pool: &PoolConfig) -> Arc<Self> {
        Self::with_launcher(ProcessLauncher::new(engine), pool)
    }
}

impl<L: EngineLauncher> EnginePool<L> {
    pub fn with_launcher(launcher: L, pool: &PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            launcher,
            idle: Mutex::new(Vec::with_capacity(pool.size)),
            permits: Arc::new(Semaphore::new(pool.size)),
            waiting: AtomicUsize::new(0),
            size: pool.size,
            queue_capacity: pool.queue_capacity,
        })
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Maximum number of engines.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of engines that could be checked out right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Number of started engines waiting for their next game.
    pub fn idle_count(&self) -> usize {
        self.idle_engines().len()
    }

    /// Number of callers currently queued in [`checkout`](Self::checkout).
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Waits for a free engine and hands it out for one game.
    ///
    /// A reused engine is reset with `ucinewgame` first; if the reset fails
    /// the engine is replaced by a fresh one.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::PoolSaturated`] if the wait queue is full
    /// - [`AnalysisError::Cancelled`] if the pool has been shut down
    /// - [`AnalysisError::EngineStartFailure`] if a new engine cannot start
    pub async fn checkout(self: &Arc<Self>) -> Result<PooledEngine<L>, AnalysisError> {
        let permit = {
            let ticket = WaitTicket::enter(&self.waiting);
            if self.permits.available_permits() == 0 && ticket.ahead >= self.queue_capacity {
                warn!(waiting = ticket.ahead, "engine pool saturated; rejecting analysis");
                return Err(AnalysisError::PoolSaturated(ticket.ahead));
            }
            self.permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AnalysisError::Cancelled)?
        };

        let engine = match self.take_idle() {
            Some(mut engine) => match engine.new_game().await {
                Ok(()) => {
                    debug!(engine = %engine.name(), "reusing pooled engine");
                    engine
                }
                Err(err) => {
                    warn!(error = %err, "pooled engine failed to reset; replacing it");
                    engine.stop().await;
                    self.launch().await?
                }
            },
            None => self.launch().await?,
        };

        Ok(PooledEngine {
            engine: Some(engine),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Closes the pool and stops every idle engine.
    ///
    /// Engines still checked out are stopped when their guard drops.
    pub async fn shutdown(&self) {
        self.permits.close();
        let engines = std::mem::take(&mut *self.idle_engines());
        info!(count = engines.len(), "shutting down engine pool");
        for mut engine in engines {
            engine.stop().await;
        }
    }

    async fn launch(&self) -> Result<EngineClient, AnalysisError> {
        let engine = self.launcher.launch().await?;
        info!(engine = %engine.name(), "started pooled engine");
        Ok(engine)
    }

    fn take_idle(&self) -> Option<EngineClient> {
        self.idle_engines().pop()
    }

    fn release(&self, engine: EngineClient) {
        if self.permits.is_closed() {
            debug!("pool closed; dropping returned engine");
            return;
        }
        if engine.is_ready() {
            self.idle_engines().push(engine);
        } else {
            warn!(state = %engine.state(), "discarding unhealthy engine");
        }
    }

    fn idle_engines(&self) -> MutexGuard<'_, Vec<EngineClient>> {
        // The critical sections only push/pop; a poisoned lock still holds a
        // consistent vector.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counts a caller as waiting for as long as the ticket lives.
struct WaitTicket<'a> {
    counter: &'a AtomicUsize,
    ahead: usize,
}

impl<'a> WaitTicket<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let ahead = counter.fetch_add(1, Ordering::SeqCst);
        Self { counter, ahead }
    }
}

impl Drop for WaitTicket<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An engine checked out of an [`EnginePool`] for one game.
///
/// Dropping the guard returns a healthy engine to the pool; an engine that
/// failed, timed out, or was interrupted is dropped, which terminates its
/// process.
pub struct PooledEngine<L: EngineLauncher = ProcessLauncher> {
    engine: Option<EngineClient>,
    pool: Arc<EnginePool<L>>,
    _permit: OwnedSemaphorePermit,
}

impl<L: EngineLauncher> PooledEngine<L> {
    /// Name of the underlying engine.
    pub fn name(&self) -> &str {
        self.engine.as_ref().map_or("", |e| e.name())
    }

    pub fn state(&self) -> EngineState {
        self.engine
            .as_ref()
            .map_or(EngineState::Stopped, EngineClient::state)
    }

    /// Stops the engine now instead of returning it to the pool.
    pub async fn discard(mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop().await;
        }
    }
}

impl<L: EngineLauncher> PositionEvaluator for PooledEngine<L> {
    async fn evaluate(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        match self.engine.as_mut() {
            Some(engine) => engine.submit_position(fen).await,
            None => Err(EngineError::NotReady(EngineState::Stopped)),
        }
    }
}

impl<L: EngineLauncher> Drop for PooledEngine<L> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.release(engine);
        }
    }
}
