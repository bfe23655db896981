//! Analysis error types

use std::time::Duration;

use thiserror::Error;

/// Failures of a single evaluator process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
}

impl EngineError {
    /// Whether the classifier can keep going with this ply left unscored.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Malformed game record: {0}")]
    MalformedGameRecord(#[from] chess_core::GameRecordError),

    #[error(transparent)]
    Evaluator(#[from] EngineError),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error(transparent)]
    Catalog(#[from] chess_core::CatalogError),
}
