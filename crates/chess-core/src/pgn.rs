//! PGN parsing utilities: a lightweight regex-based parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::GameRecordError;
use crate::game_data::RawGame;
use crate::position::STARTING_FEN;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap());
static HEADER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static VARIATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"O-O-O[+#]?|O-O[+#]?|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?").unwrap()
});
static TERMINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(1-0|0-1|1/2-1/2|\*)\s*$").unwrap());

/// Parse a single PGN game into a RawGame.
///
/// Missing White/Black headers become "Unknown". The result comes from the
/// Result header, falling back to the movetext termination marker.
pub fn parse_pgn(pgn: &str) -> Result<RawGame, GameRecordError> {
    let mut white = "Unknown".to_string();
    let mut black = "Unknown".to_string();
    let mut result = None;
    let mut setup = None;
    let mut fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => white = value,
            "Black" => black = value,
            "Result" => result = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // Games from custom positions cannot be replayed from the initial board
    if setup.as_deref() == Some("1") {
        if let Some(ref f) = fen {
            if f != STARTING_FEN {
                return Err(GameRecordError::UnsupportedStart);
            }
        }
    }

    let movetext = strip_movetext(pgn);
    let result = match result {
        Some(r) => r,
        None => TERMINATION_RE
            .captures(movetext.trim_end())
            .map(|c| c[1].to_string())
            .ok_or_else(|| GameRecordError::InvalidResult(String::new()))?,
    };

    let moves = extract_moves(&movetext);
    if moves.is_empty() {
        return Err(GameRecordError::MissingMoves);
    }

    Ok(RawGame {
        white,
        black,
        result,
        moves,
    })
}

/// Split a multi-game PGN file into individual game texts.
///
/// A new game starts at every `[Event ` header that follows movetext.
pub fn split_games(text: &str) -> Vec<String> {
    let mut games = Vec::new();
    let mut current = String::new();
    let mut seen_movetext = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("[Event ") && seen_movetext {
            games.push(std::mem::take(&mut current));
            seen_movetext = false;
        }
        if !trimmed.is_empty() && !trimmed.starts_with('[') {
            seen_movetext = true;
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        games.push(current);
    }
    games
}

/// Remove headers, comments and variations, leaving the movetext.
fn strip_movetext(pgn: &str) -> String {
    let no_headers = HEADER_LINE_RE.replace_all(pgn, "");
    let no_comments = COMMENT_RE.replace_all(&no_headers, "");
    VARIATION_RE.replace_all(&no_comments, "").into_owned()
}

/// Extract SAN moves from movetext.
fn extract_moves(movetext: &str) -> Vec<String> {
    MOVE_RE
        .find_iter(movetext)
        .map(|m| m.as_str().to_string())
        .collect()
}
