//! UCI analysis engine client.
//!
//! An [`EngineClient`] owns one engine process. The process's stdin/stdout
//! belong to a background driver task; the client talks to the driver over a
//! single-slot request channel and receives each answer on a oneshot channel
//! created for that request. The UCI stream carries no request ids, so this
//! is what keeps responses matched to requests: at most one search is in
//! flight, and a reply can only ever reach the request that created its
//! channel.
//!
//! ```text
//! Stopped -> Starting -> Ready <-> Evaluating
//!                          \           |
//!                           +----------+--> Stopped
//! ```

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uci::{EngineMessage, GoOptions, GuiCommand};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluation::{score_to_centipawns, PositionEvaluation};

/// Lifecycle state of an engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Stopped,
    Starting,
    Ready,
    Evaluating,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Ready => "ready",
            EngineState::Evaluating => "evaluating",
        };
        f.write_str(s)
    }
}

/// Anything that can evaluate a position given as FEN.
///
/// [`EngineClient`] is the production implementation; tests substitute
/// scripted evaluators.
pub trait PositionEvaluator: Send {
    /// Evaluates `fen` from the side to move's perspective.
    fn evaluate(
        &mut self,
        fen: &str,
    ) -> impl Future<Output = Result<PositionEvaluation, EngineError>> + Send;
}

enum Request {
    Evaluate {
        fen: String,
        reply: oneshot::Sender<Result<PositionEvaluation, EngineError>>,
    },
    NewGame {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Client for one UCI analysis engine process.
pub struct EngineClient {
    name: String,
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<EngineState>,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl EngineClient {
    /// Spawns the engine executable from `config` and performs the handshake.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Spawn`] if the process cannot be started
    /// - [`EngineError::Handshake`] if it does not reach `readyok` within
    ///   the handshake budget
    pub async fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Handshake("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Handshake("engine stdout unavailable".to_string()))?;

        debug!(path = %config.path.display(), pid = ?child.id(), "engine process spawned");
        Self::start(stdout, stdin, Some(child), config).await
    }

    /// Drives an engine that is already running on the other end of
    /// `reader`/`writer` (a socket, or an in-memory double in tests).
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(reader, writer, None, config).await
    }

    async fn start<R, W>(
        reader: R,
        writer: W,
        child: Option<Child>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(EngineState::Starting);
        let mut driver = Driver {
            lines: BufReader::new(reader).lines(),
            writer,
            child,
            state: state_tx,
            depth: config.depth,
            request_timeout: config.request_timeout(),
            shutdown_grace: config.shutdown_grace(),
        };

        let budget = config.handshake_timeout();
        let handshake = tokio::time::timeout(
            budget,
            driver.handshake(config.threads, config.hash_mb),
        )
        .await;
        let name = match handshake {
            Ok(Ok(name)) => name,
            Ok(Err(err)) => {
                driver.terminate().await;
                return Err(match err {
                    EngineError::Handshake(_) => err,
                    other => EngineError::Handshake(other.to_string()),
                });
            }
            Err(_) => {
                driver.terminate().await;
                return Err(EngineError::Handshake(format!(
                    "no readyok within {:?}",
                    budget
                )));
            }
        };

        info!(engine = %name, "engine ready");
        driver.set_state(EngineState::Ready);

        let (requests_tx, requests_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(driver.run(requests_rx, shutdown.clone()));

        Ok(Self {
            name,
            requests: requests_tx,
            state: state_rx,
            shutdown,
            driver: Some(handle),
        })
    }

    /// Returns the engine's name as reported via `id name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Whether the engine can accept a request right now.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Submits a position and waits for the engine's `bestmove`.
    ///
    /// The evaluation is relative to the side to move in `fen`.
    pub async fn submit_position(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        let (reply, answer) = oneshot::channel();
        self.dispatch(Request::Evaluate {
            fen: fen.to_string(),
            reply,
        })
        .await?;
        answer.await.map_err(|_| {
            EngineError::Crashed("engine driver stopped before answering".to_string())
        })?
    }

    /// Resets the engine's game state (`ucinewgame` + `isready`).
    pub async fn new_game(&mut self) -> Result<(), EngineError> {
        let (reply, answer) = oneshot::channel();
        self.dispatch(Request::NewGame { reply }).await?;
        answer.await.map_err(|_| {
            EngineError::Crashed("engine driver stopped before answering".to_string())
        })?
    }

    async fn dispatch(&mut self, request: Request) -> Result<(), EngineError> {
        let state = self.state();
        if state != EngineState::Ready {
            return Err(EngineError::NotReady(state));
        }
        self.requests
            .send(request)
            .await
            .map_err(|_| EngineError::Crashed("engine driver is gone".to_string()))
    }

    /// Shuts the engine down and waits until the process is gone.
    ///
    /// Sends `quit`, waits for the configured grace period and kills the
    /// process if it is still alive. An in-flight search is abandoned.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.driver.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "engine driver task failed");
            }
        }
    }
}

impl PositionEvaluator for EngineClient {
    async fn evaluate(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        self.submit_position(fen).await
    }
}

impl Drop for EngineClient {
    fn drop(&mut self) {
        // The driver terminates the process once it sees the cancellation;
        // `kill_on_drop` covers a runtime that is already shutting down.
        self.shutdown.cancel();
    }
}

impl fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineClient")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Owns the engine's streams and serves one request at a time.
struct Driver<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
    child: Option<Child>,
    state: watch::Sender<EngineState>,
    depth: u32,
    request_timeout: Duration,
    shutdown_grace: Duration,
}

/// What the driver does after finishing a request.
enum Next {
    Continue,
    Exit,
}

enum Reply {
    Evaluation(
        oneshot::Sender<Result<PositionEvaluation, EngineError>>,
        Result<PositionEvaluation, EngineError>,
    ),
    NewGame(oneshot::Sender<Result<(), EngineError>>, Result<(), EngineError>),
}

impl Reply {
    /// The caller may have given up on the request; the answer is then
    /// dropped, since no other request can receive it.
    fn deliver(self) {
        match self {
            Reply::Evaluation(tx, result) => {
                let _ = tx.send(result);
            }
            Reply::NewGame(tx, result) => {
                let _ = tx.send(result);
            }
        }
    }
}

impl<R, W> Driver<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run(mut self, mut requests: mpsc::Receiver<Request>, shutdown: CancellationToken) {
        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let (reply, next) = match request {
                Request::Evaluate { fen, reply } => {
                    let (result, next) = self.serve_evaluation(&fen, &shutdown).await;
                    (Reply::Evaluation(reply, result), next)
                }
                Request::NewGame { reply } => {
                    let (result, next) = self.serve_new_game(&shutdown).await;
                    (Reply::NewGame(reply, result), next)
                }
            };

            // Terminate before answering so the caller never observes a
            // dying engine as busy.
            if let Next::Exit = next {
                self.terminate().await;
                reply.deliver();
                return;
            }
            reply.deliver();
        }

        self.terminate().await;
    }

    async fn serve_evaluation(
        &mut self,
        fen: &str,
        shutdown: &CancellationToken,
    ) -> (Result<PositionEvaluation, EngineError>, Next) {
        self.set_state(EngineState::Evaluating);
        let budget = self.request_timeout;

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(EngineError::Cancelled),
            result = tokio::time::timeout(budget, self.search(fen)) => {
                result.unwrap_or(Err(EngineError::Timeout(budget)))
            }
        };

        match outcome {
            Ok(evaluation) => {
                trace!(fen, score = evaluation.score_cp, best = ?evaluation.best_move, "position evaluated");
                self.set_state(EngineState::Ready);
                (Ok(evaluation), Next::Continue)
            }
            Err(EngineError::Timeout(budget)) => {
                warn!(fen, ?budget, "engine search timed out");
                let next = self.recover_after_timeout().await;
                (Err(EngineError::Timeout(budget)), next)
            }
            Err(err) => (Err(err), Next::Exit),
        }
    }

    async fn serve_new_game(
        &mut self,
        shutdown: &CancellationToken,
    ) -> (Result<(), EngineError>, Next) {
        self.set_state(EngineState::Evaluating);
        let budget = self.request_timeout;

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(EngineError::Cancelled),
            result = tokio::time::timeout(budget, self.reset()) => {
                result.unwrap_or(Err(EngineError::Timeout(budget)))
            }
        };

        match outcome {
            Ok(()) => {
                self.set_state(EngineState::Ready);
                (Ok(()), Next::Continue)
            }
            Err(err) => (Err(err), Next::Exit),
        }
    }

    /// Runs the UCI handshake and returns the engine's name.
    async fn handshake(&mut self, threads: u32, hash_mb: u32) -> Result<String, EngineError> {
        self.send(&GuiCommand::Uci).await?;

        let mut name = None;
        loop {
            match self.next_message().await? {
                EngineMessage::IdName(n) => name = Some(n),
                EngineMessage::UciOk => break,
                _ => {}
            }
        }

        self.send(&GuiCommand::set_option("Threads", threads)).await?;
        self.send(&GuiCommand::set_option("Hash", hash_mb)).await?;
        self.sync_ready().await?;

        Ok(name.unwrap_or_else(|| "Unknown Engine".to_string()))
    }

    async fn reset(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::UciNewGame).await?;
        self.sync_ready().await
    }

    async fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady).await?;
        loop {
            if let EngineMessage::ReadyOk = self.next_message().await? {
                return Ok(());
            }
        }
    }

    /// Sets up `fen`, searches it, and folds the score lines into one
    /// evaluation. The last reported score wins.
    async fn search(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        self.send(&GuiCommand::position_fen(fen)).await?;
        self.send(&GuiCommand::Go(GoOptions::depth(self.depth)))
            .await?;

        let mut score_cp = 0;
        loop {
            match self.next_message().await? {
                EngineMessage::Info(info) => {
                    if let Some(score) = info.score {
                        score_cp = score_to_centipawns(score);
                    }
                }
                EngineMessage::BestMove { mv, .. } => {
                    return Ok(PositionEvaluation {
                        score_cp,
                        best_move: mv,
                    });
                }
                _ => {}
            }
        }
    }

    /// After a timeout the engine may still be searching. Ask it to stop and
    /// swallow the late `bestmove` so it cannot answer the next request.
    async fn recover_after_timeout(&mut self) -> Next {
        if self.send(&GuiCommand::Stop).await.is_err() {
            return Next::Exit;
        }

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            loop {
                if let EngineMessage::BestMove { .. } = self.next_message().await? {
                    return Ok::<(), EngineError>(());
                }
            }
        })
        .await;

        match drained {
            Ok(Ok(())) => {
                debug!("discarded late bestmove after timeout");
                self.set_state(EngineState::Ready);
                Next::Continue
            }
            _ => {
                warn!("engine did not stop after timeout; shutting it down");
                Next::Exit
            }
        }
    }

    async fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        let line = command.to_string();
        debug!(command = %line, "engine <-");
        let crashed = |e: std::io::Error| EngineError::Crashed(format!("write failed: {}", e));
        self.writer.write_all(line.as_bytes()).await.map_err(crashed)?;
        self.writer.write_all(b"\n").await.map_err(crashed)?;
        self.writer.flush().await.map_err(crashed)?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<EngineMessage, EngineError> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    trace!(line = %line, "engine ->");
                    if let Some(message) = EngineMessage::parse(&line) {
                        return Ok(message);
                    }
                }
                Ok(None) => {
                    return Err(EngineError::Crashed("engine closed its output".to_string()))
                }
                Err(e) => return Err(EngineError::Crashed(format!("read failed: {}", e))),
            }
        }
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    /// Asks the engine to quit and makes sure the process is gone.
    async fn terminate(&mut self) {
        let _ = self.send(&GuiCommand::Quit).await;
        let _ = self.writer.shutdown().await;

        if let Some(child) = self.child.as_mut() {
            match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "engine exited"),
                Ok(Err(e)) => warn!(error = %e, "failed to wait for engine"),
                Err(_) => {
                    warn!("engine ignored quit; killing it");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill engine");
                    }
                }
            }
        }

        self.set_state(EngineState::Stopped);
        info!("engine stopped");
    }
}
