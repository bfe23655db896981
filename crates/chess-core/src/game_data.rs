use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GameRecordError;

/// Result tag of a game as it appears in PGN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "1-0")]
    WhiteWin,
    #[serde(rename = "0-1")]
    BlackWin,
    #[serde(rename = "1/2-1/2")]
    Draw,
    #[serde(rename = "*")]
    Unknown,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameResult {
    type Err = GameRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1-0" => Ok(GameResult::WhiteWin),
            "0-1" => Ok(GameResult::BlackWin),
            "1/2-1/2" => Ok(GameResult::Draw),
            "*" => Ok(GameResult::Unknown),
            other => Err(GameRecordError::InvalidResult(other.to_string())),
        }
    }
}

/// A game record as delivered by the fetch layer: names, result tag and SAN moves.
///
/// The result is kept as the raw tag so that a bad tag is rejected by the
/// classifier instead of at deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGame {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub moves: Vec<String>, // SAN notation
}

impl RawGame {
    pub fn new(white: &str, black: &str, result: &str, moves: &[&str]) -> Self {
        Self {
            white: white.to_string(),
            black: black.to_string(),
            result: result.to_string(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Parse the result tag.
    pub fn parsed_result(&self) -> Result<GameResult, GameRecordError> {
        self.result.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_round_trip() {
        for tag in ["1-0", "0-1", "1/2-1/2", "*"] {
            let result: GameResult = tag.parse().unwrap();
            assert_eq!(result.to_string(), tag);
        }
    }

    #[test]
    fn test_invalid_result() {
        let game = RawGame::new("a", "b", "2-0", &["e4"]);
        assert!(matches!(
            game.parsed_result(),
            Err(GameRecordError::InvalidResult(tag)) if tag == "2-0"
        ));
    }
}
