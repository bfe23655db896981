//! UCI evaluation engine adapter (async I/O)
//!
//! One [`UciEngine`] owns one engine process. UCI engines are single-session,
//! so concurrent games each get their own instance from an
//! [`EvaluatorFactory`] instead of sharing a process.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Magnitude used for forced mates before the distance adjustment.
pub const MATE_SCORE: i32 = 10_000;

/// Longest mate distance taken at face value; larger ones are clamped.
const MAX_MATE_DISTANCE: i32 = 999;

/// How long a timed-out search gets to answer `stop` before the engine is written off.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// How long `quit` may take before the process is killed.
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Engine score, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, zero or negative = gets mated)
    Mate(i32),
}

impl Score {
    /// Collapse to a single centipawn scale.
    ///
    /// Mates map to `±10000` adjusted by distance, so a shorter mate is
    /// always larger in magnitude than a longer one or any material score.
    /// Absurd distances are clamped so the sign always follows the mating side.
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) => {
                let n = n.clamp(-MAX_MATE_DISTANCE, MAX_MATE_DISTANCE);
                if n > 0 {
                    MATE_SCORE - n * 10
                } else {
                    -MATE_SCORE - n * 10
                }
            }
        }
    }
}

/// Result of a single position evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: Score,
    /// Best move in UCI notation, absent in terminal positions
    pub best_move: Option<String>,
}

/// Search budget for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Nodes(u32),
    Depth(u32),
    MoveTime(Duration),
}

impl SearchLimit {
    fn go_command(&self) -> String {
        match self {
            SearchLimit::Nodes(n) => format!("go nodes {n}"),
            SearchLimit::Depth(d) => format!("go depth {d}"),
            SearchLimit::MoveTime(t) => format!("go movetime {}", t.as_millis()),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        SearchLimit::Nodes(100_000)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine binary
    pub path: String,
    /// Extra command-line arguments
    pub args: Vec<String>,
    pub threads: u32,
    pub hash_mb: u32,
    /// Budget for one evaluation on top of the search limit
    pub eval_timeout: Duration,
    /// Budget for the UCI handshake
    pub startup_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: "/usr/local/bin/stockfish".to_string(),
            args: Vec::new(),
            threads: 1,
            hash_mb: 64,
            eval_timeout: Duration::from_secs(10),
            startup_timeout: Duration::from_secs(10),
        }
    }
}

/// Anything that can score a FEN position.
pub trait PositionEvaluator: Send {
    fn evaluate(
        &mut self,
        fen: &str,
        limit: &SearchLimit,
    ) -> impl Future<Output = Result<Evaluation, EngineError>> + Send;

    /// Release the underlying resources. Safe to call more than once.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}

/// Creates one evaluator per concurrent worker.
pub trait EvaluatorFactory: Send + Sync + 'static {
    type Evaluator: PositionEvaluator + 'static;

    fn create(&self) -> impl Future<Output = Result<Self::Evaluator, EngineError>> + Send;
}

/// Whether an evaluator is available at all, decided once at startup.
pub enum EngineCapability<F> {
    Available(F),
    Unavailable(String),
}

impl EngineCapability<UciEngineFactory> {
    /// Start and stop one engine to check the configured binary works.
    pub async fn probe(config: EngineConfig) -> Self {
        match UciEngine::start(&config).await {
            Ok(mut engine) => {
                engine.stop().await;
                EngineCapability::Available(UciEngineFactory::new(config))
            }
            Err(e) => {
                warn!(path = %config.path, error = %e, "Evaluation engine unavailable");
                EngineCapability::Unavailable(e.to_string())
            }
        }
    }
}

/// Launches a fresh [`UciEngine`] per call.
#[derive(Debug, Clone)]
pub struct UciEngineFactory {
    config: EngineConfig,
}

impl UciEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EvaluatorFactory for UciEngineFactory {
    type Evaluator = UciEngine;

    async fn create(&self) -> Result<UciEngine, EngineError> {
        UciEngine::start(&self.config).await
    }
}

/// UCI engine instance
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Partially read line; survives a cancelled read
    line: String,
    eval_timeout: Duration,
    dead: bool,
}

impl UciEngine {
    /// Spawn a new engine process and initialize UCI
    pub async fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut process = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("Failed to spawn {}: {e}", config.path))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("Engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("Engine stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
            eval_timeout: config.eval_timeout,
            dead: false,
        };

        let handshake = async {
            engine.send("uci").await?;
            engine.wait_for("uciok").await?;
            engine
                .send(&format!("setoption name Threads value {}", config.threads))
                .await?;
            engine
                .send(&format!("setoption name Hash value {}", config.hash_mb))
                .await?;
            engine.send("isready").await?;
            engine.wait_for("readyok").await
        };

        match timeout(config.startup_timeout, handshake).await {
            Ok(Ok(())) => Ok(engine),
            Ok(Err(e)) => {
                engine.stop().await;
                Err(e)
            }
            Err(_) => {
                engine.stop().await;
                Err(EngineError::Unavailable(format!(
                    "No UCI handshake within {:?}",
                    config.startup_timeout
                )))
            }
        }
    }

    /// OS process id, while the process is running
    pub fn id(&self) -> Option<u32> {
        self.process.id()
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "UCI <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| self.died(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| self.died(format!("Failed to flush engine stdin: {e}")))?;
        Ok(())
    }

    /// Read one complete line, trimmed.
    async fn next_line(&mut self) -> Result<String, EngineError> {
        let read = self
            .stdout
            .read_line(&mut self.line)
            .await
            .map_err(|e| self.died(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Err(self.died("Engine closed its output".to_string()));
        }
        let line = std::mem::take(&mut self.line);
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "UCI >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.next_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Read search output up to `bestmove`, keeping the last reported score.
    ///
    /// A malformed score line fails the search, but only once its `bestmove`
    /// has been consumed so the next search starts on a clean stream.
    async fn read_search(&mut self) -> Result<Evaluation, EngineError> {
        let mut score = None;
        let mut malformed = None;
        loop {
            let line = self.next_line().await?;
            if line.starts_with("info") {
                match parse_score(&line) {
                    Ok(Some(s)) => score = Some(s),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(line = %line, "Unparseable engine score");
                        if malformed.is_none() {
                            malformed = Some(e);
                        }
                    }
                }
            } else if line.starts_with("bestmove") {
                if let Some(e) = malformed {
                    return Err(e);
                }
                let score = score.ok_or_else(|| {
                    EngineError::MalformedResponse(format!("{line:?} without a score"))
                })?;
                return Ok(Evaluation {
                    score,
                    best_move: parse_bestmove(&line),
                });
            }
        }
    }

    /// Ask a running search to stop and discard its output.
    async fn abort_search(&mut self) {
        let drain = async {
            self.send("stop").await?;
            loop {
                if self.next_line().await?.starts_with("bestmove") {
                    return Ok::<(), EngineError>(());
                }
            }
        };
        if !matches!(timeout(STOP_GRACE, drain).await, Ok(Ok(()))) {
            warn!("Engine ignored stop, marking it unavailable");
            self.dead = true;
        }
    }

    fn died(&mut self, reason: String) -> EngineError {
        self.dead = true;
        EngineError::Unavailable(reason)
    }
}

impl PositionEvaluator for UciEngine {
    async fn evaluate(&mut self, fen: &str, limit: &SearchLimit) -> Result<Evaluation, EngineError> {
        if self.dead {
            return Err(EngineError::Unavailable("Engine process is no longer usable".into()));
        }

        self.send(&format!("position fen {fen}")).await?;
        self.send(&limit.go_command()).await?;

        let budget = match limit {
            SearchLimit::MoveTime(t) => self.eval_timeout + *t,
            _ => self.eval_timeout,
        };

        match timeout(budget, self.read_search()).await {
            Ok(result) => result,
            Err(_) => {
                self.abort_search().await;
                Err(EngineError::Timeout(budget))
            }
        }
    }

    /// Send quit, then kill and reap the process if it lingers.
    async fn stop(&mut self) {
        self.dead = true;
        if let Ok(Some(_)) = self.process.try_wait() {
            return;
        }
        let _ = self.send("quit").await;
        if timeout(QUIT_GRACE, self.process.wait()).await.is_err() {
            let _ = self.process.kill().await;
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Parse the score from an info line.
///
/// Returns `Ok(None)` for info lines that carry no score.
fn parse_score(line: &str) -> Result<Option<Score>, EngineError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(i) = parts.iter().position(|p| *p == "score") else {
        return Ok(None);
    };

    let malformed = || EngineError::MalformedResponse(line.to_string());
    let kind = parts.get(i + 1).ok_or_else(malformed)?;
    let value: i32 = parts
        .get(i + 2)
        .and_then(|v| v.parse().ok())
        .ok_or_else(malformed)?;

    match *kind {
        "cp" => Ok(Some(Score::Centipawns(value))),
        "mate" => Ok(Some(Score::Mate(value))),
        _ => Err(malformed()),
    }
}

/// Parse the best move from a bestmove line
fn parse_bestmove(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|m| *m != "(none)" && *m != "0000")
        .map(String::from)
}
