pub use chess_core;

pub mod batch;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod player;
pub mod report;
pub mod repertoire;
pub mod weakness;

pub use batch::{analyze_batch, classify_cancellable, BatchAnalyzer, GameOutcome, GameStatus};
pub use classifier::{
    classify, classify_unscored, ClassifiedGame, ClassifyOptions, MoveRecord, Phase, Severity,
};
pub use config::AnalysisConfig;
pub use engine::{
    EngineCapability, EngineConfig, Evaluation, EvaluatorFactory, PositionEvaluator, Score,
    SearchLimit, UciEngine, UciEngineFactory,
};
pub use error::{AnalysisError, ConfigError, EngineError};
pub use report::{analyze_player, PlayerReport};
pub use repertoire::{
    build_repertoire, compare_repertoires, opening_statistics, preparation_suggestions, OpeningStatistics,
    Repertoire,
};
pub use weakness::{extract as extract_weaknesses, WeaknessReport};
