//! Recurring-error extraction for one player across many games.

use chess_core::Side;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifiedGame, Phase, PhaseCounts, Severity};
use crate::player::PlayerMatch;

/// Length of the worst-moves list
pub const WORST_MOVES: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseAverages {
    pub opening: f64,
    pub middlegame: f64,
    pub endgame: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstMove {
    pub san: String,
    pub eval_delta: i32,
    pub phase: Phase,
    pub fen: String,
    pub move_number: usize,
    pub side: Side,
    pub opponent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessReport {
    pub player: String,
    /// Games the player was found in
    pub games: u32,
    pub blunders_by_phase: PhaseCounts,
    pub mistakes_by_phase: PhaseCounts,
    /// Mean evaluation loss per phase, 0.0 where nothing was scored
    pub average_loss_by_phase: PhaseAverages,
    pub worst_moves: Vec<WorstMove>,
}

#[derive(Default)]
struct LossSum {
    total: i64,
    count: u32,
}

impl LossSum {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / f64::from(self.count)
        }
    }
}

/// Aggregate the player's own moves: counts and mean loss per phase, and
/// their ten costliest blunders.
///
/// Unscored plies are ignored.
pub fn extract(games: &[ClassifiedGame], player: &str) -> WeaknessReport {
    let matcher = PlayerMatch::new(player);
    let mut blunders_by_phase = PhaseCounts::default();
    let mut mistakes_by_phase = PhaseCounts::default();
    let mut losses: [LossSum; 3] = Default::default();
    let mut worst_moves = Vec::new();
    let mut game_count = 0;

    for game in games {
        let Some(side) = matcher.side_in(&game.white, &game.black) else {
            continue;
        };
        game_count += 1;
        let opponent = match side {
            Side::White => &game.black,
            Side::Black => &game.white,
        };

        for record in game.moves.iter().filter(|m| m.side() == side) {
            let Some(delta) = record.eval_delta else {
                continue;
            };
            let phase = record.phase;

            let sum = &mut losses[phase_index(phase)];
            sum.total += i64::from(delta);
            sum.count += 1;

            match record.severity {
                Severity::Blunder => {
                    blunders_by_phase.increment(phase);
                    worst_moves.push(WorstMove {
                        san: record.san.clone(),
                        eval_delta: delta,
                        phase,
                        fen: record.fen_before.clone(),
                        move_number: record.move_number,
                        side,
                        opponent: opponent.clone(),
                    });
                }
                Severity::Mistake => mistakes_by_phase.increment(phase),
                Severity::None => {}
            }
        }
    }

    worst_moves.sort_by(|a, b| b.eval_delta.cmp(&a.eval_delta));
    worst_moves.truncate(WORST_MOVES);

    WeaknessReport {
        player: player.to_string(),
        games: game_count,
        blunders_by_phase,
        mistakes_by_phase,
        average_loss_by_phase: PhaseAverages {
            opening: losses[phase_index(Phase::Opening)].mean(),
            middlegame: losses[phase_index(Phase::Middlegame)].mean(),
            endgame: losses[phase_index(Phase::Endgame)].mean(),
        },
        worst_moves,
    }
}

fn phase_index(phase: Phase) -> usize {
    match phase {
        Phase::Opening => 0,
        Phase::Middlegame => 1,
        Phase::Endgame => 2,
    }
}
