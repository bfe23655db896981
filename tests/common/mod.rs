#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use game_analysis::engine::{EngineConfig, Evaluation, PositionEvaluator, Score, SearchLimit};
use game_analysis::error::EngineError;

/// Engine config that runs the shell fake engine in the given mode.
pub fn fake_engine(mode: &str) -> EngineConfig {
    EngineConfig {
        path: "sh".to_string(),
        args: vec![
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fake_uci.sh").to_string(),
            mode.to_string(),
        ],
        eval_timeout: Duration::from_secs(2),
        startup_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

/// Evaluator that replays a fixed list of side-to-move scores in call order.
///
/// Once the list runs out every further position scores 0.
pub struct ScriptedEvaluator {
    scores: VecDeque<i32>,
    pub calls: usize,
}

impl ScriptedEvaluator {
    pub fn new(scores: &[i32]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            calls: 0,
        }
    }
}

impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&mut self, _fen: &str, _limit: &SearchLimit) -> Result<Evaluation, EngineError> {
        self.calls += 1;
        Ok(Evaluation {
            score: Score::Centipawns(self.scores.pop_front().unwrap_or(0)),
            best_move: None,
        })
    }

    async fn stop(&mut self) {}
}

pub const SAMPLE_PGN: &str = r#"[Event "Club Championship"]
[Site "?"]
[Date "2024.03.01"]
[White "Hero, Ann"]
[Black "Rival, Bob"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 1-0

[Event "Club Championship"]
[Site "?"]
[Date "2024.03.08"]
[White "Hero, Ann"]
[Black "Third, Cy"]
[Result "1/2-1/2"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 6. Re1 b5 1/2-1/2

[Event "Club Championship"]
[Site "?"]
[Date "2024.03.15"]
[White "Rival, Bob"]
[Black "Hero, Ann"]
[Result "1-0"]

1. d4 d5 2. c4 c6 3. Nf3 Nf6 1-0

[Event "Club Championship"]
[Site "?"]
[Date "2024.03.22"]
[White "Third, Cy"]
[Black "Hero, Ann"]
[Result "0-1"]

1. d4 d5 2. c4 c6 3. Nc3 Nf6 0-1
"#;
