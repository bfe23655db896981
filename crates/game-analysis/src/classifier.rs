//! Per-move classification of a game: evaluation delta, severity and phase.

use chess_core::position::{self, Position};
use chess_core::{GameRecordError, GameResult, OpeningCatalog, OpeningMatch, RawGame, Side};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Evaluation, PositionEvaluator, Score, SearchLimit, UciEngine};
use crate::error::AnalysisError;

/// Default severity thresholds (centipawn loss)
pub const BLUNDER_THRESHOLD: i32 = 300;
pub const MISTAKE_THRESHOLD: i32 = 100;

/// Default cap on classified plies per game
pub const MAX_PLIES: usize = 200;

/// Phase boundaries, in plies played and non-pawn, non-king pieces on the board
const OPENING_MAX_PLIES: usize = 15;
const MIDDLEGAME_MAX_PLIES: usize = 40;
const MIDDLEGAME_MIN_PIECES: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Mistake,
    Blunder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Opening, Phase::Middlegame, Phase::Endgame];

    /// Phase of the game at a position.
    ///
    /// Material is only consulted after the opening, so a piece-heavy game
    /// stays in the middlegame well past the ply boundary.
    pub fn of(position: &Position) -> Self {
        if position.plies_played <= OPENING_MAX_PLIES {
            Phase::Opening
        } else if position.non_pawn_pieces >= MIDDLEGAME_MIN_PIECES
            || position.plies_played <= MIDDLEGAME_MAX_PLIES
        {
            Phase::Middlegame
        } else {
            Phase::Endgame
        }
    }
}

/// One counter per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub opening: u32,
    pub middlegame: u32,
    pub endgame: u32,
}

impl PhaseCounts {
    pub fn get(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Opening => self.opening,
            Phase::Middlegame => self.middlegame,
            Phase::Endgame => self.endgame,
        }
    }

    pub fn increment(&mut self, phase: Phase) {
        match phase {
            Phase::Opening => self.opening += 1,
            Phase::Middlegame => self.middlegame += 1,
            Phase::Endgame => self.endgame += 1,
        }
    }

    pub fn total(&self) -> u32 {
        Phase::ALL.iter().map(|&phase| self.get(phase)).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub blunders: u32,
    pub mistakes: u32,
}

/// A single classified ply.
///
/// Evaluations are from the perspective of the side that moved. A ply with
/// no `eval_delta` was not scored (the engine was unavailable or failed on
/// one of its positions); its severity is `none` but it is excluded from
/// every count and average.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 0-based ply index
    pub ply: usize,
    /// 1-based full move number
    pub move_number: usize,
    pub san: String,
    pub fen_before: String,
    pub fen_after: String,
    pub eval_before: Option<i32>,
    pub eval_after: Option<i32>,
    pub eval_delta: Option<i32>,
    pub severity: Severity,
    pub phase: Phase,
    /// Engine's preferred move in the position before, UCI notation
    pub best_move: Option<String>,
}

impl MoveRecord {
    pub fn side(&self) -> Side {
        Side::of_ply(self.ply)
    }

    pub fn is_scored(&self) -> bool {
        self.eval_delta.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedGame {
    pub white: String,
    pub black: String,
    pub result: GameResult,
    pub opening: Option<OpeningMatch>,
    pub moves: Vec<MoveRecord>,
    /// Plies in the full record, classified or not
    pub total_plies: usize,
    /// Classification stopped at the ply cap
    pub truncated: bool,
    pub white_errors: ErrorCounts,
    pub black_errors: ErrorCounts,
    /// Mean delta over scored plies, 0.0 when nothing was scored
    pub average_eval_loss: f64,
    pub phase_histogram: PhaseCounts,
}

impl ClassifiedGame {
    pub fn errors(&self, side: Side) -> ErrorCounts {
        match side {
            Side::White => self.white_errors,
            Side::Black => self.black_errors,
        }
    }

    /// SAN moves as classified.
    pub fn san_moves(&self) -> impl Iterator<Item = &str> {
        self.moves.iter().map(|m| m.san.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub max_plies: usize,
    pub blunder_threshold: i32,
    pub mistake_threshold: i32,
    pub limit: SearchLimit,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            max_plies: MAX_PLIES,
            blunder_threshold: BLUNDER_THRESHOLD,
            mistake_threshold: MISTAKE_THRESHOLD,
            limit: SearchLimit::default(),
        }
    }
}

impl ClassifyOptions {
    /// Blunder beats mistake; a delta exactly at a threshold does not cross it.
    pub fn severity(&self, delta: i32) -> Severity {
        if delta > self.blunder_threshold {
            Severity::Blunder
        } else if delta > self.mistake_threshold {
            Severity::Mistake
        } else {
            Severity::None
        }
    }
}

/// Ground lost by the mover. Both evaluations are from the mover's perspective.
pub fn evaluation_delta(eval_before: i32, eval_after: i32) -> i32 {
    eval_before.saturating_sub(eval_after)
}

/// Check a record without evaluating anything: the result tag must parse and
/// every move must replay legally.
///
/// Returns the parsed result and the replayed positions.
pub fn validate_record(raw: &RawGame) -> Result<(GameResult, Vec<Position>), AnalysisError> {
    let result = raw.parsed_result()?;
    if raw.moves.is_empty() {
        return Err(GameRecordError::MissingMoves.into());
    }
    let positions = position::replay(&raw.moves)?;
    Ok((result, positions))
}

/// Classify a game without an engine: every ply is recorded but unscored.
pub async fn classify_unscored(
    raw: &RawGame,
    catalog: &OpeningCatalog,
    options: &ClassifyOptions,
) -> Result<ClassifiedGame, AnalysisError> {
    classify::<UciEngine>(raw, None, catalog, options).await
}

/// Classify every ply of a game, up to `options.max_plies`.
///
/// The whole record is validated before any evaluation: a bad result tag or
/// an illegal move rejects the game. Evaluation timeouts and malformed
/// engine replies leave the affected plies unscored; a dead engine aborts
/// the game.
pub async fn classify<E: PositionEvaluator>(
    raw: &RawGame,
    mut evaluator: Option<&mut E>,
    catalog: &OpeningCatalog,
    options: &ClassifyOptions,
) -> Result<ClassifiedGame, AnalysisError> {
    let (result, positions) = validate_record(raw)?;

    let plies = raw.moves.len().min(options.max_plies);
    let truncated = raw.moves.len() > plies;
    if truncated {
        warn!(
            white = %raw.white,
            black = %raw.black,
            total = raw.moves.len(),
            max_plies = options.max_plies,
            "Game exceeds ply cap, truncating"
        );
    }

    info!(white = %raw.white, black = %raw.black, plies, "Classifying game");

    // The position after ply i is the position before ply i + 1, so each
    // board is evaluated once.
    let mut evals: Vec<Option<Evaluation>> = Vec::with_capacity(plies + 1);
    for (i, pos) in positions[..=plies].iter().enumerate() {
        let eval = match evaluator.as_deref_mut() {
            // Nothing to search: the side to move is mated
            Some(_) if pos.is_checkmate => Some(Evaluation {
                score: Score::Mate(0),
                best_move: None,
            }),
            Some(engine) => match engine.evaluate(&pos.fen, &options.limit).await {
                Ok(eval) => Some(eval),
                Err(e) if e.is_recoverable() => {
                    warn!(ply = i, fen = %pos.fen, error = %e, "Position left unscored");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        evals.push(eval);
    }

    let mut moves = Vec::with_capacity(plies);
    let mut white_errors = ErrorCounts::default();
    let mut black_errors = ErrorCounts::default();
    let mut phase_histogram = PhaseCounts::default();
    let mut delta_sum = 0i64;
    let mut scored = 0u32;

    for ply in 0..plies {
        let before = &positions[ply];
        let after = &positions[ply + 1];

        // Before: mover to move. After: opponent to move, so negate.
        let eval_before = evals[ply].as_ref().map(|e| e.score.centipawns());
        let eval_after = evals[ply + 1]
            .as_ref()
            .map(|e| e.score.centipawns().saturating_neg());
        let eval_delta = match (eval_before, eval_after) {
            (Some(b), Some(a)) => Some(evaluation_delta(b, a)),
            _ => None,
        };

        let severity = eval_delta.map_or(Severity::None, |d| options.severity(d));
        let phase = Phase::of(before);

        if let Some(d) = eval_delta {
            delta_sum += i64::from(d);
            scored += 1;
        }

        let counts = match Side::of_ply(ply) {
            Side::White => &mut white_errors,
            Side::Black => &mut black_errors,
        };
        match severity {
            Severity::Blunder => counts.blunders += 1,
            Severity::Mistake => counts.mistakes += 1,
            Severity::None => {}
        }
        phase_histogram.increment(phase);

        moves.push(MoveRecord {
            ply,
            move_number: ply / 2 + 1,
            san: raw.moves[ply].clone(),
            fen_before: before.fen.clone(),
            fen_after: after.fen.clone(),
            eval_before,
            eval_after,
            eval_delta,
            severity,
            phase,
            best_move: evals[ply].as_ref().and_then(|e| e.best_move.clone()),
        });
    }

    let average_eval_loss = if scored > 0 {
        delta_sum as f64 / f64::from(scored)
    } else {
        0.0
    };

    let opening = catalog.identify(&raw.moves);

    info!(
        white = %raw.white,
        black = %raw.black,
        scored,
        white_blunders = white_errors.blunders,
        black_blunders = black_errors.blunders,
        opening = opening.as_ref().map(|o| o.code.as_str()).unwrap_or("-"),
        "Game classified"
    );

    Ok(ClassifiedGame {
        white: raw.white.clone(),
        black: raw.black.clone(),
        result,
        opening,
        moves,
        total_plies: raw.moves.len(),
        truncated,
        white_errors,
        black_errors,
        average_eval_loss,
        phase_histogram,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chess_core::CATALOG;

    use super::*;
    use crate::error::EngineError;

    /// Answers from a FEN table, defaulting to 0 cp.
    #[derive(Default)]
    struct TableEvaluator {
        scores: HashMap<String, Result<Score, EngineError>>,
        calls: usize,
    }

    impl TableEvaluator {
        fn with(mut self, fen: &str, score: Result<Score, EngineError>) -> Self {
            self.scores.insert(fen.to_string(), score);
            self
        }
    }

    impl PositionEvaluator for TableEvaluator {
        async fn evaluate(&mut self, fen: &str, _limit: &SearchLimit) -> Result<Evaluation, EngineError> {
            self.calls += 1;
            let score = self.scores.get(fen).cloned().unwrap_or(Ok(Score::Centipawns(0)))?;
            Ok(Evaluation {
                score,
                best_move: Some("e2e4".to_string()),
            })
        }

        async fn stop(&mut self) {}
    }

    fn fens(moves: &[&str]) -> Vec<String> {
        let moves: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
        position::replay(&moves).unwrap().into_iter().map(|p| p.fen).collect()
    }

    #[test]
    fn test_blunder_fixture() {
        let options = ClassifyOptions::default();
        let delta = evaluation_delta(0, -350);
        assert_eq!(delta, 350);
        assert_eq!(options.severity(delta), Severity::Blunder);
    }

    #[test]
    fn test_severity_thresholds() {
        let options = ClassifyOptions::default();
        assert_eq!(options.severity(301), Severity::Blunder);
        assert_eq!(options.severity(300), Severity::Mistake);
        assert_eq!(options.severity(101), Severity::Mistake);
        assert_eq!(options.severity(100), Severity::None);
        assert_eq!(options.severity(-250), Severity::None);
    }

    #[test]
    fn test_phase_boundaries() {
        let pos = |plies_played, non_pawn_pieces| Position {
            fen: String::new(),
            side_to_move: Side::White,
            plies_played,
            non_pawn_pieces,
            is_checkmate: false,
        };
        assert_eq!(Phase::of(&pos(15, 2)), Phase::Opening);
        assert_eq!(Phase::of(&pos(16, 2)), Phase::Middlegame);
        assert_eq!(Phase::of(&pos(40, 2)), Phase::Middlegame);
        assert_eq!(Phase::of(&pos(41, 11)), Phase::Endgame);
        assert_eq!(Phase::of(&pos(90, 12)), Phase::Middlegame);
    }

    #[tokio::test]
    async fn test_black_blunder_is_symmetric() {
        let game = RawGame::new("W", "B", "1-0", &["e4", "e5", "Nf3"]);
        let f = fens(&["e4", "e5", "Nf3"]);
        // Before e5 black (to move) is level; after e5 white (to move) is +350
        let mut engine = TableEvaluator::default().with(&f[2], Ok(Score::Centipawns(350)));

        let classified = classify(&game, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap();

        let e5 = &classified.moves[1];
        assert_eq!(e5.eval_before, Some(0));
        assert_eq!(e5.eval_after, Some(-350));
        assert_eq!(e5.eval_delta, Some(350));
        assert_eq!(e5.severity, Severity::Blunder);
        assert_eq!(classified.errors(Side::Black).blunders, 1);

        // Nf3 starts from -350 for black, i.e. +350 for white, and lands on 0
        let nf3 = &classified.moves[2];
        assert_eq!(nf3.eval_delta, Some(350));
        assert_eq!(classified.errors(Side::White).blunders, 1);
        assert_eq!(classified.errors(Side::White).mistakes, 0);

        // One evaluation per board
        assert_eq!(engine.calls, 4);
    }

    #[tokio::test]
    async fn test_mated_position_is_not_searched() {
        let game = RawGame::new("W", "B", "0-1", &["f3", "e5", "g4", "Qh4#"]);
        let mut engine = TableEvaluator::default();

        let classified = classify(&game, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap();

        // Five boards, the last one mate
        assert_eq!(engine.calls, 4);
        let mate = &classified.moves[3];
        assert_eq!(mate.eval_before, Some(0));
        assert_eq!(mate.eval_after, Some(10_000));
        assert_eq!(mate.eval_delta, Some(-10_000));
        assert_eq!(mate.severity, Severity::None);
    }

    #[tokio::test]
    async fn test_extreme_scores_saturate() {
        let game = RawGame::new("W", "B", "*", &["e4"]);
        let f = fens(&["e4"]);
        let mut engine = TableEvaluator::default()
            .with(&f[0], Ok(Score::Centipawns(i32::MIN)))
            .with(&f[1], Ok(Score::Centipawns(i32::MIN)));

        let classified = classify(&game, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap();

        let e4 = &classified.moves[0];
        assert_eq!(e4.eval_after, Some(i32::MAX));
        assert_eq!(e4.eval_delta, Some(i32::MIN));
        assert_eq!(e4.severity, Severity::None);
        assert_eq!(evaluation_delta(i32::MAX, i32::MIN), i32::MAX);
    }

    #[tokio::test]
    async fn test_timeout_leaves_ply_unscored() {
        let game = RawGame::new("W", "B", "*", &["d4", "d5", "c4"]);
        let f = fens(&["d4", "d5", "c4"]);
        let mut engine = TableEvaluator::default()
            .with(&f[1], Err(EngineError::Timeout(std::time::Duration::from_secs(1))));

        let classified = classify(&game, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap();

        assert_eq!(classified.moves[0].eval_delta, None);
        assert_eq!(classified.moves[1].eval_delta, None);
        assert_eq!(classified.moves[2].eval_delta, Some(0));
        assert!(!classified.moves[0].is_scored());
    }

    #[tokio::test]
    async fn test_dead_engine_aborts_game() {
        let game = RawGame::new("W", "B", "*", &["d4", "d5"]);
        let f = fens(&["d4"]);
        let mut engine = TableEvaluator::default()
            .with(&f[1], Err(EngineError::Unavailable("gone".into())));

        let err = classify(&game, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::Evaluator(EngineError::Unavailable("gone".into())));
    }

    #[tokio::test]
    async fn test_ply_cap_truncates() {
        let game = RawGame::new("W", "B", "*", &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6"]);
        let options = ClassifyOptions {
            max_plies: 4,
            ..ClassifyOptions::default()
        };
        let mut engine = TableEvaluator::default();

        let classified = classify(&game, Some(&mut engine), &CATALOG, &options).await.unwrap();

        assert!(classified.truncated);
        assert_eq!(classified.moves.len(), 4);
        assert_eq!(classified.total_plies, 6);
        assert_eq!(engine.calls, 5);
    }

    #[tokio::test]
    async fn test_malformed_record_rejected_before_evaluation() {
        let mut engine = TableEvaluator::default();

        let bad_move = RawGame::new("W", "B", "1-0", &["e4", "Ke3"]);
        let err = classify(&bad_move, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedGameRecord(GameRecordError::IllegalMove { ply: 1, .. })));

        let bad_result = RawGame::new("W", "B", "", &["e4"]);
        let err = classify(&bad_result, Some(&mut engine), &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedGameRecord(GameRecordError::InvalidResult(_))));

        assert_eq!(engine.calls, 0);
    }

    #[tokio::test]
    async fn test_unscored_game() {
        let game = RawGame::new("W", "B", "*", &["e4", "e5"]);
        let classified = classify_unscored(&game, &CATALOG, &ClassifyOptions::default())
            .await
            .unwrap();

        assert_eq!(classified.moves.len(), 2);
        for record in &classified.moves {
            assert_eq!(record.eval_delta, None);
            assert_eq!(record.severity, Severity::None);
            assert_eq!(record.phase, Phase::Opening);
        }
        assert_eq!(classified.average_eval_loss, 0.0);
        assert_eq!(classified.opening.unwrap().code, "C20");
    }
}
