//! Opening repertoire aggregation for one player.
//!
//! Games are split into four buckets (as White, and as Black against 1.e4,
//! 1.d4 or anything else) and aggregated per identified opening code.

use std::collections::BTreeMap;

use chess_core::position::normalize_san;
use chess_core::{GameResult, Side};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifiedGame;
use crate::player::PlayerMatch;

/// Openings played fewer times than this are dropped as noise.
pub const MIN_GAMES: u32 = 2;

/// Plies of the observed line kept with each entry
pub const PREFIX_PLIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    AsWhite,
    AsBlackVsE4,
    AsBlackVsD4,
    AsBlackVsOther,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::AsWhite,
        Bucket::AsBlackVsE4,
        Bucket::AsBlackVsD4,
        Bucket::AsBlackVsOther,
    ];

    fn of(side: Side, first_move: &str) -> Self {
        match (side, normalize_san(first_move)) {
            (Side::White, _) => Bucket::AsWhite,
            (Side::Black, "e4") => Bucket::AsBlackVsE4,
            (Side::Black, "d4") => Bucket::AsBlackVsD4,
            (Side::Black, _) => Bucket::AsBlackVsOther,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Game outcome from the player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    /// Unfinished games (`*`) count as draws.
    pub fn for_side(result: GameResult, side: Side) -> Self {
        match (result, side) {
            (GameResult::WhiteWin, Side::White) | (GameResult::BlackWin, Side::Black) => {
                Outcome::Win
            }
            (GameResult::WhiteWin, Side::Black) | (GameResult::BlackWin, Side::White) => {
                Outcome::Loss
            }
            (GameResult::Draw | GameResult::Unknown, _) => Outcome::Draw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningVariationStat {
    pub code: String,
    pub name: String,
    /// Line seen in the most recent game with this opening
    pub moves: Vec<String>,
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub draw_rate: f64,
    pub loss_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repertoire {
    pub player: String,
    pub as_white: Vec<OpeningVariationStat>,
    pub as_black_vs_e4: Vec<OpeningVariationStat>,
    pub as_black_vs_d4: Vec<OpeningVariationStat>,
    pub as_black_vs_other: Vec<OpeningVariationStat>,
}

impl Repertoire {
    pub fn bucket(&self, bucket: Bucket) -> &[OpeningVariationStat] {
        match bucket {
            Bucket::AsWhite => &self.as_white,
            Bucket::AsBlackVsE4 => &self.as_black_vs_e4,
            Bucket::AsBlackVsD4 => &self.as_black_vs_d4,
            Bucket::AsBlackVsOther => &self.as_black_vs_other,
        }
    }
}

#[derive(Default)]
struct Tally {
    name: String,
    moves: Vec<String>,
    wins: u32,
    draws: u32,
    losses: u32,
}

impl Tally {
    fn games(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    fn into_stat(self, code: String) -> OpeningVariationStat {
        let games = self.games();
        let rate = |n: u32| f64::from(n) / f64::from(games);
        OpeningVariationStat {
            win_rate: rate(self.wins),
            draw_rate: rate(self.draws),
            loss_rate: rate(self.losses),
            code,
            name: self.name,
            moves: self.moves,
            games,
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
        }
    }
}

/// Build a player's repertoire from classified games.
///
/// Games the player is not in, games shorter than two plies and games with
/// no identified opening are skipped.
pub fn build_repertoire(games: &[ClassifiedGame], player: &str) -> Repertoire {
    let matcher = PlayerMatch::new(player);
    let mut buckets: [BTreeMap<String, Tally>; 4] = Default::default();

    for game in games {
        if game.moves.len() < 2 {
            continue;
        }
        let Some(side) = matcher.side_in(&game.white, &game.black) else {
            continue;
        };
        let Some(opening) = &game.opening else {
            continue;
        };

        let bucket = Bucket::of(side, &game.moves[0].san);
        let tally = buckets[bucket.index()]
            .entry(opening.code.clone())
            .or_insert_with(|| Tally {
                name: opening.name.clone(),
                ..Tally::default()
            });

        tally.moves = game.san_moves().take(PREFIX_PLIES).map(String::from).collect();
        match Outcome::for_side(game.result, side) {
            Outcome::Win => tally.wins += 1,
            Outcome::Draw => tally.draws += 1,
            Outcome::Loss => tally.losses += 1,
        }
    }

    let [as_white, vs_e4, vs_d4, vs_other] = buckets;
    Repertoire {
        player: player.to_string(),
        as_white: finish(as_white),
        as_black_vs_e4: finish(vs_e4),
        as_black_vs_d4: finish(vs_d4),
        as_black_vs_other: finish(vs_other),
    }
}

/// Drop rare openings and sort by frequency, most played first (ties by code).
fn finish(tallies: BTreeMap<String, Tally>) -> Vec<OpeningVariationStat> {
    let mut stats: Vec<OpeningVariationStat> = tallies
        .into_iter()
        .filter(|(_, t)| t.games() >= MIN_GAMES)
        .map(|(code, t)| t.into_stat(code))
        .collect();
    // Stable sort keeps the code order among equal counts
    stats.sort_by(|a, b| b.games.cmp(&a.games));
    stats
}

/// Results of every game with one opening, by the result tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTally {
    pub white_wins: u32,
    pub black_wins: u32,
    pub draws: u32,
}

/// Whole-collection statistics for one opening code, independent of any player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningStatistics {
    pub code: String,
    pub name: String,
    pub games: u32,
    /// Summed over both sides
    pub total_blunders: u32,
    pub total_mistakes: u32,
    pub results: ResultTally,
}

/// Tally every identified game by opening code, ordered by code.
///
/// Unfinished games (`*`) count towards `games` but not towards `results`.
pub fn opening_statistics(games: &[ClassifiedGame]) -> Vec<OpeningStatistics> {
    let mut by_code: BTreeMap<&str, OpeningStatistics> = BTreeMap::new();

    for game in games {
        let Some(opening) = &game.opening else {
            continue;
        };
        let entry = by_code.entry(opening.code.as_str()).or_insert_with(|| OpeningStatistics {
            code: opening.code.clone(),
            name: opening.name.clone(),
            games: 0,
            total_blunders: 0,
            total_mistakes: 0,
            results: ResultTally::default(),
        });

        entry.games += 1;
        for side in [Side::White, Side::Black] {
            let errors = game.errors(side);
            entry.total_blunders += errors.blunders;
            entry.total_mistakes += errors.mistakes;
        }
        match game.result {
            GameResult::WhiteWin => entry.results.white_wins += 1,
            GameResult::BlackWin => entry.results.black_wins += 1,
            GameResult::Draw => entry.results.draws += 1,
            GameResult::Unknown => {}
        }
    }

    by_code.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedOpening {
    pub first: OpeningVariationStat,
    pub second: OpeningVariationStat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketComparison {
    pub bucket: Bucket,
    pub common: Vec<SharedOpening>,
    pub only_first: Vec<OpeningVariationStat>,
    pub only_second: Vec<OpeningVariationStat>,
}

/// Compare two repertoires bucket by bucket on opening code.
pub fn compare_repertoires(first: &Repertoire, second: &Repertoire) -> Vec<BucketComparison> {
    Bucket::ALL
        .iter()
        .map(|&bucket| {
            let a: BTreeMap<&str, &OpeningVariationStat> =
                first.bucket(bucket).iter().map(|s| (s.code.as_str(), s)).collect();
            let b: BTreeMap<&str, &OpeningVariationStat> =
                second.bucket(bucket).iter().map(|s| (s.code.as_str(), s)).collect();

            let common = a
                .iter()
                .filter_map(|(code, sa)| {
                    b.get(code).map(|sb| SharedOpening {
                        first: (*sa).clone(),
                        second: (*sb).clone(),
                    })
                })
                .collect();
            let only_first = a
                .iter()
                .filter(|(code, _)| !b.contains_key(*code))
                .map(|(_, s)| (*s).clone())
                .collect();
            let only_second = b
                .iter()
                .filter(|(code, _)| !a.contains_key(*code))
                .map(|(_, s)| (*s).clone())
                .collect();

            BucketComparison {
                bucket,
                common,
                only_first,
                only_second,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    WhiteOpening,
    BlackDefense,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub code: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub bucket: Bucket,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparationSuggestions {
    pub strengths: Vec<Suggestion>,
    pub weaknesses: Vec<Suggestion>,
    pub recommendations: Vec<Recommendation>,
}

/// Score thresholds as (strong rate, strong min games, weak rate, weak min games)
const WHITE_THRESHOLDS: (f64, u32, f64, u32) = (0.6, 5, 0.4, 3);
const BLACK_THRESHOLDS: (f64, u32, f64, u32) = (0.5, 5, 0.35, 3);

/// Flag strong and weak openings and thin parts of the repertoire.
pub fn preparation_suggestions(repertoire: &Repertoire) -> PreparationSuggestions {
    let mut out = PreparationSuggestions::default();

    for bucket in Bucket::ALL {
        let (kind, (strong, strong_games, weak, weak_games), strong_label, weak_label) =
            if bucket == Bucket::AsWhite {
                (SuggestionKind::WhiteOpening, WHITE_THRESHOLDS, "Strong performance", "Poor performance")
            } else {
                (SuggestionKind::BlackDefense, BLACK_THRESHOLDS, "Solid defense", "Struggling defense")
            };

        for stat in repertoire.bucket(bucket) {
            let suggestion = |label: &str| Suggestion {
                kind,
                code: stat.code.clone(),
                name: stat.name.clone(),
                reason: format!(
                    "{label}: {:.1}% win rate in {} games",
                    stat.win_rate * 100.0,
                    stat.games
                ),
            };
            if stat.win_rate > strong && stat.games >= strong_games {
                out.strengths.push(suggestion(strong_label));
            } else if stat.win_rate < weak && stat.games >= weak_games {
                out.weaknesses.push(suggestion(weak_label));
            }
        }
    }

    let thin = [
        (Bucket::AsWhite, 3, "Consider expanding your opening repertoire as White"),
        (Bucket::AsBlackVsE4, 2, "Develop more defenses against 1.e4"),
        (Bucket::AsBlackVsD4, 2, "Develop more defenses against 1.d4"),
    ];
    for (bucket, min, text) in thin {
        if repertoire.bucket(bucket).len() < min {
            out.recommendations.push(Recommendation {
                bucket,
                suggestion: text.to_string(),
            });
        }
    }

    out
}
