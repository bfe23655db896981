//! Error types for game records and the opening catalog

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameRecordError {
    #[error("Invalid result tag: {0:?}")]
    InvalidResult(String),

    #[error("Illegal move {san:?} at ply {ply}: {reason}")]
    IllegalMove {
        ply: usize,
        san: String,
        reason: String,
    },

    #[error("Game record has no moves")]
    MissingMoves,

    #[error("Game does not start from the standard position")]
    UnsupportedStart,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read opening catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse opening catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Opening catalog entry {0} has no moves")]
    EmptyEntry(String),
}
