//! Position replay on top of shakmaty.
//!
//! Replays a SAN move list from the initial position and produces one
//! immutable [`Position`] snapshot per board state.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{Chess, Color, EnPassantMode, Position as _};

use crate::error::GameRecordError;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Side that plays the given 0-based ply.
    pub fn of_ply(ply: usize) -> Self {
        if ply % 2 == 0 { Side::White } else { Side::Black }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Immutable board snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub fen: String,
    pub side_to_move: Side,
    /// Plies played from the initial position up to this board
    pub plies_played: usize,
    /// Queens, rooks, bishops and knights of both colors
    pub non_pawn_pieces: u32,
    pub is_checkmate: bool,
}

impl Position {
    fn snapshot(pos: &Chess, plies_played: usize) -> Self {
        let board = pos.board();
        let non_pawn = board.occupied().count() - board.pawns().count() - board.kings().count();
        Self {
            fen: Fen::from_position(pos, EnPassantMode::Legal).to_string(),
            side_to_move: pos.turn().into(),
            plies_played,
            non_pawn_pieces: non_pawn as u32,
            is_checkmate: pos.is_checkmate(),
        }
    }
}

/// Replay SAN moves from the initial position.
///
/// Returns `moves.len() + 1` positions: the start position followed by the
/// position after each move. Fails on the first move that does not parse or
/// is illegal.
pub fn replay(moves: &[String]) -> Result<Vec<Position>, GameRecordError> {
    let mut pos = Chess::default();
    let mut positions = Vec::with_capacity(moves.len() + 1);
    positions.push(Position::snapshot(&pos, 0));

    for (ply, move_san) in moves.iter().enumerate() {
        let illegal = |reason: String| GameRecordError::IllegalMove {
            ply,
            san: move_san.clone(),
            reason,
        };

        let san: San = move_san
            .parse()
            .map_err(|e| illegal(format!("{e}")))?;
        let mv = san.to_move(&pos).map_err(|e| illegal(format!("{e}")))?;
        pos.play_unchecked(mv);

        positions.push(Position::snapshot(&pos, ply + 1));
    }

    Ok(positions)
}

/// Strip check, mate and annotation suffixes so SAN from different sources compares equal.
pub fn normalize_san(san: &str) -> &str {
    san.trim_end_matches(['+', '#', '!', '?'])
}
