//! Integration tests: the UCI engine wrapper against a scripted engine process.
//!
//! The fake engine is a POSIX shell script, so these run wherever `sh` exists.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chess_core::{RawGame, CATALOG};
use game_analysis::batch::{classify_cancellable, BatchAnalyzer, GameOutcome};
use game_analysis::classifier::{classify, ClassifyOptions, Severity};
use game_analysis::engine::{
    EngineCapability, EngineConfig, PositionEvaluator, Score, SearchLimit, UciEngine, UciEngineFactory,
};
use game_analysis::error::{AnalysisError, EngineError};
use tokio_util::sync::CancellationToken;

use common::fake_engine;

#[tokio::test]
async fn test_fake_engine_scores_every_ply() {
    let mut engine = UciEngine::start(&fake_engine("fast")).await.unwrap();
    let raw = RawGame::new("A", "B", "1/2-1/2", &["e4", "e5", "Nf3"]);

    let game = classify(&raw, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
        .await
        .unwrap();
    engine.stop().await;

    assert_eq!(game.moves.len(), 3);
    for m in &game.moves {
        // Every side to move is +25, so each move hands the opponent +25
        assert_eq!(m.eval_before, Some(25));
        assert_eq!(m.eval_after, Some(-25));
        assert_eq!(m.eval_delta, Some(50));
        assert_eq!(m.severity, Severity::None);
        assert_eq!(m.best_move.as_deref(), Some("e2e4"));
    }
}

#[tokio::test]
async fn test_garbled_score_keeps_engine_in_step() {
    let mut engine = UciEngine::start(&fake_engine("garbled")).await.unwrap();
    let limit = SearchLimit::default();
    let fen = chess_core::position::STARTING_FEN;

    let first = engine.evaluate(fen, &limit).await;
    assert!(matches!(first, Err(EngineError::MalformedResponse(_))));

    // Each later answer belongs to its own search
    let second = engine.evaluate(fen, &limit).await.unwrap();
    assert_eq!(second.score, Score::Centipawns(200));
    let third = engine.evaluate(fen, &limit).await.unwrap();
    assert_eq!(third.score, Score::Centipawns(300));

    engine.stop().await;
}

#[tokio::test]
async fn test_garbled_score_only_costs_one_position() {
    let mut engine = UciEngine::start(&fake_engine("garbled")).await.unwrap();
    let raw = RawGame::new("A", "B", "*", &["e4", "e5"]);

    let game = classify(&raw, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
        .await
        .unwrap();
    engine.stop().await;

    // Start position unscored; searches 2 and 3 score the boards after e4 and e5
    assert_eq!(game.moves[0].eval_delta, None);
    assert_eq!(game.moves[1].eval_before, Some(200));
    assert_eq!(game.moves[1].eval_after, Some(-300));
    assert_eq!(game.moves[1].eval_delta, Some(500));
}

#[tokio::test]
async fn test_crashed_engine_fails_game() {
    let mut engine = UciEngine::start(&fake_engine("crash")).await.unwrap();
    let raw = RawGame::new("A", "B", "*", &["d4"]);

    let err = classify(&raw, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
        .await
        .unwrap_err();
    engine.stop().await;

    assert!(matches!(err, AnalysisError::Evaluator(EngineError::Unavailable(_))));
}

#[tokio::test]
async fn test_slow_engine_leaves_plies_unscored() {
    let config = EngineConfig {
        eval_timeout: Duration::from_millis(200),
        ..fake_engine("slow")
    };
    let mut engine = UciEngine::start(&config).await.unwrap();
    let raw = RawGame::new("A", "B", "*", &["c4"]);

    let game = classify(&raw, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
        .await
        .unwrap();
    engine.stop().await;

    assert_eq!(game.moves.len(), 1);
    assert_eq!(game.moves[0].eval_delta, None);
    assert_eq!(game.moves[0].severity, Severity::None);
}

#[tokio::test]
async fn test_cancel_reaps_engine_process() {
    let engine = UciEngine::start(&fake_engine("slow")).await.unwrap();
    let pid = engine.id().unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let raw = RawGame::new("A", "B", "*", &["e4", "c5"]);
    let err = classify_cancellable(&raw, engine, &CATALOG, &ClassifyOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::Cancelled);

    #[cfg(target_os = "linux")]
    assert!(
        !std::path::Path::new(&format!("/proc/{pid}")).exists(),
        "engine process {pid} still present after cancellation"
    );
    #[cfg(not(target_os = "linux"))]
    let _ = pid;
}

#[tokio::test]
async fn test_probe_missing_binary() {
    let config = EngineConfig {
        path: "/nonexistent/uci-engine".to_string(),
        ..EngineConfig::default()
    };
    assert!(matches!(
        EngineCapability::probe(config).await,
        EngineCapability::Unavailable(_)
    ));
}

#[tokio::test]
async fn test_batch_runs_one_process_per_game() {
    let capability = EngineCapability::probe(fake_engine("fast")).await;
    assert!(matches!(capability, EngineCapability::Available(_)));

    let batch: BatchAnalyzer<UciEngineFactory> =
        BatchAnalyzer::new(capability, Arc::new(CATALOG.clone()), ClassifyOptions::default(), 2);
    let games = vec![
        RawGame::new("A", "B", "1-0", &["e4", "e5"]),
        RawGame::new("C", "D", "0-1", &["d4", "d5"]),
        RawGame::new("E", "F", "*", &["c4"]),
    ];

    let outcomes = batch.run(games).await;
    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        let game = outcome.classified().unwrap();
        assert!(game.moves.iter().all(|m| m.is_scored()));
    }
}

#[tokio::test]
async fn test_outcomes_serialize_with_status_tag() {
    let capability = EngineCapability::probe(fake_engine("fast")).await;
    let batch = BatchAnalyzer::new(capability, Arc::new(CATALOG.clone()), ClassifyOptions::default(), 1);
    let outcomes = batch
        .run(vec![
            RawGame::new("A", "B", "1-0", &["e4"]),
            RawGame::new("C", "D", "2-0", &["e4"]),
        ])
        .await;

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["status"], "classified");
    assert_eq!(json[0]["game"]["moves"][0]["san"], "e4");
    assert_eq!(json[0]["game"]["result"], "1-0");
    assert_eq!(json[1]["status"], "failed");
    assert_eq!(json[1]["index"], 1);
    assert!(json[1]["error"].as_str().unwrap().contains("2-0"));

    let back: Vec<GameOutcome> = serde_json::from_value(json).unwrap();
    assert_eq!(back[0].classified().unwrap().moves.len(), 1);
    assert!(back[1].classified().is_none());
}
