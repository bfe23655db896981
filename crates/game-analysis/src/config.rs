//! Analysis configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chess_core::OpeningCatalog;
use tracing::info;

use crate::classifier::ClassifyOptions;
use crate::engine::{EngineConfig, SearchLimit};
use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// How to launch and talk to the evaluation engine
    pub engine: EngineConfig,

    /// Per-game classification settings
    pub classify: ClassifyOptions,

    /// Maximum number of games (and engine processes) in flight
    pub workers: usize,

    /// Optional JSON opening catalog replacing the built-in one
    pub catalog_path: Option<String>,
}

impl AnalysisConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; set but unparseable values are
    /// rejected rather than silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        let engine_path = env::var("ENGINE_PATH")
            .or_else(|_| env::var("STOCKFISH_PATH"))
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());

        let nodes: u32 = parse_var("NODES_PER_POSITION")?.unwrap_or(100_000);
        let depth: Option<u32> = parse_var("DEPTH")?;
        let move_time_ms: Option<u64> = parse_var("MOVE_TIME_MS")?;

        let limit = match (move_time_ms, depth) {
            (Some(ms), _) => SearchLimit::MoveTime(Duration::from_millis(ms)),
            (None, Some(d)) => SearchLimit::Depth(d),
            (None, None) => SearchLimit::Nodes(nodes),
        };

        let engine = EngineConfig {
            path: engine_path,
            args: Vec::new(),
            threads: parse_var("ENGINE_THREADS")?.unwrap_or(1),
            hash_mb: parse_var("ENGINE_HASH_MB")?.unwrap_or(64),
            eval_timeout: Duration::from_millis(parse_var("EVAL_TIMEOUT_MS")?.unwrap_or(10_000)),
            ..EngineConfig::default()
        };

        let defaults = ClassifyOptions::default();
        let classify = ClassifyOptions {
            max_plies: parse_var("MAX_PLIES")?.unwrap_or(defaults.max_plies),
            blunder_threshold: parse_var("BLUNDER_THRESHOLD")?
                .unwrap_or(defaults.blunder_threshold),
            mistake_threshold: parse_var("MISTAKE_THRESHOLD")?
                .unwrap_or(defaults.mistake_threshold),
            limit,
        };

        if classify.mistake_threshold > classify.blunder_threshold {
            return Err(ConfigError::InvalidValue {
                name: "MISTAKE_THRESHOLD",
                value: classify.mistake_threshold.to_string(),
            });
        }

        let workers = parse_var::<usize>("ANALYSIS_WORKERS")?
            .unwrap_or_else(num_cpus::get)
            .max(1);

        let catalog_path = env::var("OPENING_CATALOG_PATH").ok();

        Ok(Self {
            engine,
            classify,
            workers,
            catalog_path,
        })
    }

    /// The configured opening catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<OpeningCatalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => {
                info!(path = %path, "Loading opening catalog");
                Ok(OpeningCatalog::load(path)?)
            }
            None => Ok(OpeningCatalog::builtin()),
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; each test uses its own variable names.

    #[test]
    fn test_parse_var_missing() {
        let v: Option<u32> = parse_var("GAME_ANALYSIS_TEST_UNSET").unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn test_parse_var_invalid() {
        env::set_var("GAME_ANALYSIS_TEST_BAD", "many");
        let err = parse_var::<u32>("GAME_ANALYSIS_TEST_BAD").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "GAME_ANALYSIS_TEST_BAD", .. }));
    }

    #[test]
    fn test_parse_var_trims() {
        env::set_var("GAME_ANALYSIS_TEST_OK", " 42 ");
        assert_eq!(parse_var::<u32>("GAME_ANALYSIS_TEST_OK").unwrap(), Some(42));
    }
}
