//! In-memory UCI engine doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use uci::GuiCommand;

use crate::config::EngineConfig;
use crate::engine::{EngineClient, PositionEvaluator};
use crate::error::EngineError;
use crate::evaluation::PositionEvaluation;
use crate::pool::EngineLauncher;

/// Engine settings with short budgets so failure paths resolve quickly.
pub(crate) fn fast_config() -> EngineConfig {
    EngineConfig {
        path: "scripted".into(),
        depth: 4,
        threads: 1,
        hash_mb: 16,
        request_timeout_ms: 300,
        handshake_timeout_ms: 300,
        shutdown_grace_ms: 100,
    }
}

/// Every command line the client sent, in order.
#[derive(Clone, Default)]
pub(crate) struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    pub(crate) fn commands(&self) -> Vec<String> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut commands) = self.0.lock() {
            commands.push(line);
        }
    }
}

/// A fake engine speaking UCI over an in-memory pipe.
#[derive(Clone)]
pub(crate) struct ScriptedEngine {
    scores: Vec<String>,
    scores_by_fen: HashMap<String, Vec<String>>,
    best_move: String,
    stall_searches: usize,
    hang: bool,
    crash_on_search: bool,
    never_ready: bool,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            scores: Vec::new(),
            scores_by_fen: HashMap::new(),
            best_move: "e2e4".to_string(),
            stall_searches: 0,
            hang: false,
            crash_on_search: false,
            never_ready: false,
        }
    }

    /// Adds a score line (`"cp 35"`, `"mate -2"`) reported for every position.
    pub(crate) fn score(mut self, score: &str) -> Self {
        self.scores.push(score.to_string());
        self
    }

    /// Adds a score line reported only for `fen`.
    pub(crate) fn score_for(mut self, fen: &str, score: &str) -> Self {
        self.scores_by_fen
            .entry(fen.to_string())
            .or_default()
            .push(score.to_string());
        self
    }

    pub(crate) fn best_move(mut self, mv: &str) -> Self {
        self.best_move = mv.to_string();
        self
    }

    /// The next `n` searches only answer once they receive `stop`.
    pub(crate) fn stall_searches(mut self, n: usize) -> Self {
        self.stall_searches = n;
        self
    }

    /// Searches never answer, not even to `stop`.
    pub(crate) fn hang_searches(mut self) -> Self {
        self.hang = true;
        self
    }

    /// The engine exits as soon as a search starts.
    pub(crate) fn crash_on_search(mut self) -> Self {
        self.crash_on_search = true;
        self
    }

    /// `isready` is never answered.
    pub(crate) fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Starts the fake engine and connects a client to it.
    pub(crate) async fn connect(
        self,
        config: &EngineConfig,
    ) -> Result<(EngineClient, CommandLog), EngineError> {
        let (client_io, engine_io) = tokio::io::duplex(64 * 1024);
        let log = CommandLog::default();
        tokio::spawn(self.serve(engine_io, log.clone()));

        let (reader, writer) = tokio::io::split(client_io);
        let client = EngineClient::connect(reader, writer, config).await?;
        Ok((client, log))
    }

    async fn serve(mut self, io: DuplexStream, log: CommandLog) {
        let (reader, mut writer) = tokio::io::split(io);
        let mut lines = BufReader::new(reader).lines();
        let mut fen = String::new();
        let mut stalled = false;

        while let Ok(Some(line)) = lines.next_line().await {
            log.push(line.clone());
            let output = match GuiCommand::parse(&line) {
                Ok(GuiCommand::Uci) => vec![
                    "id name Scripted Engine".to_string(),
                    "id author tests".to_string(),
                    "option name Hash type spin default 16 min 1 max 1024".to_string(),
                    "uciok".to_string(),
                ],
                Ok(GuiCommand::IsReady) if !self.never_ready => vec!["readyok".to_string()],
                Ok(GuiCommand::Position { fen: f, .. }) => {
                    fen = f;
                    Vec::new()
                }
                Ok(GuiCommand::Go(_)) => {
                    if self.crash_on_search {
                        return;
                    }
                    if self.hang {
                        Vec::new()
                    } else if self.stall_searches > 0 {
                        self.stall_searches -= 1;
                        stalled = true;
                        Vec::new()
                    } else {
                        self.search_output(&fen)
                    }
                }
                Ok(GuiCommand::Stop) if stalled => {
                    stalled = false;
                    self.search_output(&fen)
                }
                Ok(GuiCommand::Quit) => return,
                _ => Vec::new(),
            };

            for out in output {
                if writer.write_all(out.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                {
                    return;
                }
            }
            if writer.flush().await.is_err() {
                return;
            }
        }
    }

    fn search_output(&self, fen: &str) -> Vec<String> {
        let scores = self.scores_by_fen.get(fen).unwrap_or(&self.scores);
        let mut out: Vec<String> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| format!("info depth {} score {} nodes 100 pv {}", i + 1, s, self.best_move))
            .collect();
        out.push(format!("bestmove {} ponder e7e5", self.best_move));
        out
    }
}

/// Launches [`ScriptedEngine`]s for pool tests and counts them.
pub(crate) struct ScriptedLauncher {
    pub(crate) engine: ScriptedEngine,
    pub(crate) config: EngineConfig,
    pub(crate) launched: AtomicUsize,
}

impl ScriptedLauncher {
    pub(crate) fn new(engine: ScriptedEngine) -> Self {
        Self {
            engine,
            config: fast_config(),
            launched: AtomicUsize::new(0),
        }
    }

    pub(crate) fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }
}

impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<EngineClient, EngineError> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let (client, _log) = self.engine.clone().connect(&self.config).await?;
        Ok(client)
    }
}

/// Evaluator that replays canned evaluations in order and records the
/// positions it was asked about.
pub(crate) struct ScriptedEvaluator {
    pub(crate) responses: VecDeque<Result<PositionEvaluation, EngineError>>,
    pub(crate) seen: Vec<String>,
}

impl ScriptedEvaluator {
    pub(crate) fn new(scores: &[(i32, Option<&str>)]) -> Self {
        Self {
            responses: scores
                .iter()
                .map(|(cp, best)| {
                    Ok(PositionEvaluation {
                        score_cp: *cp,
                        best_move: best.map(str::to_string),
                    })
                })
                .collect(),
            seen: Vec::new(),
        }
    }

    pub(crate) fn then_fail(mut self, err: EngineError) -> Self {
        self.responses.push_back(Err(err));
        self
    }
}

impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        self.seen.push(fen.to_string());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Crashed("script exhausted".to_string())))
    }
}
