//! Bounded-concurrency batch classification.
//!
//! Every in-flight game owns one evaluator created from the factory; a
//! semaphore caps how many exist at once, and games beyond the cap wait
//! for a permit.

use std::sync::Arc;

use chess_core::{OpeningCatalog, RawGame};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classifier::{classify, classify_unscored, validate_record, ClassifiedGame, ClassifyOptions};
use crate::engine::{EngineCapability, EvaluatorFactory, PositionEvaluator};
use crate::error::AnalysisError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameStatus {
    Classified { game: ClassifiedGame },
    Failed { error: String },
}

/// Per-game result of a batch run, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOutcome {
    pub index: usize,
    pub white: String,
    pub black: String,
    #[serde(flatten)]
    pub status: GameStatus,
}

impl GameOutcome {
    pub fn classified(&self) -> Option<&ClassifiedGame> {
        match &self.status {
            GameStatus::Classified { game } => Some(game),
            GameStatus::Failed { .. } => None,
        }
    }
}

/// Classify one game with an owned evaluator, racing a cancellation token.
///
/// The evaluator is stopped on every way out: success, error or
/// cancellation. If the task itself is dropped or panics, the evaluator's
/// own `Drop` releases it.
pub async fn classify_cancellable<E: PositionEvaluator>(
    raw: &RawGame,
    mut evaluator: E,
    catalog: &OpeningCatalog,
    options: &ClassifyOptions,
    cancel: &CancellationToken,
) -> Result<ClassifiedGame, AnalysisError> {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
        res = classify(raw, Some(&mut evaluator), catalog, options) => res,
    };
    evaluator.stop().await;
    result
}

struct Shared<F> {
    capability: EngineCapability<F>,
    catalog: Arc<OpeningCatalog>,
    options: ClassifyOptions,
    cancel: CancellationToken,
}

async fn run_one<F: EvaluatorFactory>(
    shared: Arc<Shared<F>>,
    semaphore: Arc<Semaphore>,
    raw: RawGame,
) -> Result<ClassifiedGame, AnalysisError> {
    // Hold until done
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| AnalysisError::TaskFailed(e.to_string()))?;
    if shared.cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    match &shared.capability {
        EngineCapability::Available(factory) => {
            // A bad record never costs an engine start
            validate_record(&raw)?;
            let evaluator = factory.create().await?;
            classify_cancellable(&raw, evaluator, &shared.catalog, &shared.options, &shared.cancel)
                .await
        }
        EngineCapability::Unavailable(_) => {
            classify_unscored(&raw, &shared.catalog, &shared.options).await
        }
    }
}

pub struct BatchAnalyzer<F> {
    shared: Arc<Shared<F>>,
    semaphore: Arc<Semaphore>,
}

impl<F: EvaluatorFactory> BatchAnalyzer<F> {
    pub fn new(
        capability: EngineCapability<F>,
        catalog: Arc<OpeningCatalog>,
        options: ClassifyOptions,
        workers: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                capability,
                catalog,
                options,
                cancel: CancellationToken::new(),
            }),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Token that cancels every queued and running game of this analyzer.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Classify all games, at most `workers` at a time.
    ///
    /// One failing game never fails the batch; its outcome carries the error.
    /// Dropping the returned future cancels this analyzer's token, so the
    /// spawned games stop and release their evaluators.
    pub async fn run(&self, games: Vec<RawGame>) -> Vec<GameOutcome> {
        if let EngineCapability::Unavailable(reason) = &self.shared.capability {
            warn!(reason = %reason, "No evaluation engine, games will be unscored");
        }
        info!(
            games = games.len(),
            workers = self.semaphore.available_permits(),
            "Starting batch"
        );

        let mut names = Vec::with_capacity(games.len());
        let mut handles = Vec::with_capacity(games.len());

        for raw in games {
            names.push((raw.white.clone(), raw.black.clone()));
            let shared = self.shared.clone();
            let semaphore = self.semaphore.clone();

            handles.push(tokio::spawn(run_one(shared, semaphore, raw)));
        }

        let guard = self.shared.cancel.clone().drop_guard();
        let results = futures::future::join_all(handles).await;
        guard.disarm();

        let outcomes: Vec<GameOutcome> = results
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (joined, (white, black)))| {
                let result = joined.unwrap_or_else(|e| Err(AnalysisError::TaskFailed(e.to_string())));
                let status = match result {
                    Ok(game) => GameStatus::Classified { game },
                    Err(e) => {
                        error!(index, white = %white, black = %black, error = %e, "Game analysis failed");
                        GameStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                GameOutcome {
                    index,
                    white,
                    black,
                    status,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.classified().is_none()).count();
        info!(total = outcomes.len(), failed, "Batch complete");
        outcomes
    }
}

/// One-shot batch without an external cancel handle.
pub async fn analyze_batch<F: EvaluatorFactory>(
    games: Vec<RawGame>,
    capability: EngineCapability<F>,
    catalog: Arc<OpeningCatalog>,
    options: ClassifyOptions,
    workers: usize,
) -> Vec<GameOutcome> {
    BatchAnalyzer::new(capability, catalog, options, workers)
        .run(games)
        .await
}
