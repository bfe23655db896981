//! Per-player report over a set of classified games.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::ClassifiedGame;
use crate::error::AnalysisError;
use crate::repertoire::{build_repertoire, preparation_suggestions, PreparationSuggestions, Repertoire};
use crate::weakness::{extract, WeaknessReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player: String,
    pub repertoire: Repertoire,
    pub weaknesses: WeaknessReport,
    pub suggestions: PreparationSuggestions,
}

/// Build the repertoire and the weakness report side by side.
///
/// Both only read the games, so they run as two blocking tasks over the
/// same shared slice.
pub async fn analyze_player(
    games: Arc<[ClassifiedGame]>,
    player: &str,
) -> Result<PlayerReport, AnalysisError> {
    let repertoire_task = {
        let games = games.clone();
        let player = player.to_string();
        tokio::task::spawn_blocking(move || build_repertoire(&games, &player))
    };
    let weakness_task = {
        let player = player.to_string();
        tokio::task::spawn_blocking(move || extract(&games, &player))
    };

    let (repertoire, weaknesses) = tokio::try_join!(repertoire_task, weakness_task)
        .map_err(|e| AnalysisError::TaskFailed(e.to_string()))?;
    let suggestions = preparation_suggestions(&repertoire);

    info!(
        player = %player,
        games = weaknesses.games,
        worst_moves = weaknesses.worst_moves.len(),
        "Player report built"
    );

    Ok(PlayerReport {
        player: player.to_string(),
        repertoire,
        weaknesses,
        suggestions,
    })
}
