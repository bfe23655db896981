//! Game analysis CLI
//!
//! Classifies every game in a PGN file with a UCI engine, then builds the
//! named player's repertoire and weakness report.
//!
//! Usage: analyze-games <games.pgn> --player <name> [--workers N] [--output report.json]

use std::sync::Arc;

use anyhow::{bail, Context};
use chess_core::pgn::{parse_pgn, split_games};
use game_analysis::{
    analyze_player, opening_statistics, AnalysisConfig, BatchAnalyzer, ClassifiedGame,
    EngineCapability, GameOutcome, GameStatus, OpeningStatistics, PlayerReport,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct CliArgs {
    pgn_path: String,
    player: String,
    workers: Option<usize>,
    output: Option<String>,
}

/// Parse positional PGN path plus --player, --workers and --output
fn parse_args() -> anyhow::Result<CliArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut pgn_path = None;
    let mut player = None;
    let mut workers = None;
    let mut output = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--player" => {
                player = args.get(i + 1).cloned();
                i += 1;
            }
            "--workers" => {
                let value = args.get(i + 1).context("--workers needs a value")?;
                workers = Some(value.parse().with_context(|| format!("Invalid --workers {value}"))?);
                i += 1;
            }
            "--output" => {
                output = args.get(i + 1).cloned();
                i += 1;
            }
            other if other.starts_with("--") => bail!("Unknown flag {other}"),
            other => pgn_path = Some(other.to_string()),
        }
        i += 1;
    }

    let usage = "usage: analyze-games <games.pgn> --player <name> [--workers N] [--output report.json]";
    Ok(CliArgs {
        pgn_path: pgn_path.context(usage)?,
        player: player.context(usage)?,
        workers,
        output,
    })
}

#[derive(Serialize)]
struct RunReport {
    games: Vec<GameOutcome>,
    openings: Vec<OpeningStatistics>,
    report: PlayerReport,
}

/// Cancel the batch on Ctrl-C or SIGTERM
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "SIGTERM handler unavailable");
                        let _ = tokio::signal::ctrl_c().await;
                        cancel.cancel();
                        return;
                    }
                };
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, cancelling analysis"),
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, cancelling analysis"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl-C, cancelling analysis");
        }
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let mut config = AnalysisConfig::from_env()?;
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }
    info!(
        engine_path = %config.engine.path,
        workers = config.workers,
        limit = ?config.classify.limit,
        "Analysis config loaded"
    );

    let catalog = Arc::new(config.load_catalog()?);
    info!(openings = catalog.len(), "Opening catalog ready");

    let text = tokio::fs::read_to_string(&args.pgn_path)
        .await
        .with_context(|| format!("Failed to read {}", args.pgn_path))?;

    // Games that fail to parse keep their slot as failed outcomes
    let mut outcomes: Vec<Option<GameOutcome>> = Vec::new();
    let mut parsed = Vec::new();
    let mut slots = Vec::new();
    for (index, chunk) in split_games(&text).iter().enumerate() {
        match parse_pgn(chunk) {
            Ok(raw) => {
                slots.push(index);
                parsed.push(raw);
                outcomes.push(None);
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping unparseable game");
                outcomes.push(Some(GameOutcome {
                    index,
                    white: String::new(),
                    black: String::new(),
                    status: GameStatus::Failed {
                        error: e.to_string(),
                    },
                }));
            }
        }
    }
    info!(games = outcomes.len(), parsed = parsed.len(), "PGN file read");

    let capability = EngineCapability::probe(config.engine.clone()).await;
    let batch = BatchAnalyzer::new(capability, catalog, config.classify.clone(), config.workers);
    spawn_shutdown_listener(batch.cancel_token());

    for (slot, mut outcome) in slots.into_iter().zip(batch.run(parsed).await) {
        outcome.index = slot;
        outcomes[slot] = Some(outcome);
    }
    let games: Vec<GameOutcome> = outcomes.into_iter().flatten().collect();

    let classified: Arc<[ClassifiedGame]> = games
        .iter()
        .filter_map(|o| o.classified().cloned())
        .collect();
    let openings = opening_statistics(&classified);
    let report = analyze_player(classified, &args.player).await?;

    let json = serde_json::to_string_pretty(&RunReport {
        games,
        openings,
        report,
    })?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {path}"))?;
            info!(path = %path, "Report written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
