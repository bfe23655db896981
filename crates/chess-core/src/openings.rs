//! Opening catalog and prefix-based opening identification.
//!
//! The catalog is immutable once built. [`CATALOG`] holds the built-in table
//! for the whole process; a replacement can be loaded from JSON at startup
//! and passed around by reference.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::position::normalize_san;

/// Number of plies considered when identifying an opening.
pub const IDENTIFY_PLIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningEntry {
    pub code: String,
    pub name: String,
    pub moves: Vec<String>,
}

/// Result of identifying a game's opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningMatch {
    pub code: String,
    pub name: String,
    /// Number of plies the catalog line covers
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OpeningCatalog {
    entries: Vec<OpeningEntry>,
}

/// Process-wide built-in catalog, built at first access.
pub static CATALOG: LazyLock<OpeningCatalog> = LazyLock::new(OpeningCatalog::builtin);

impl OpeningCatalog {
    pub fn new(entries: Vec<OpeningEntry>) -> Self {
        Self { entries }
    }

    /// Load a catalog from a JSON array of `{code, name, moves}` objects.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let reader = BufReader::new(File::open(path)?);
        let entries: Vec<OpeningEntry> = serde_json::from_reader(reader)?;
        if let Some(empty) = entries.iter().find(|e| e.moves.is_empty()) {
            return Err(CatalogError::EmptyEntry(empty.code.clone()));
        }
        tracing::info!(entries = entries.len(), "Loaded opening catalog");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identify the opening of a game from its first [`IDENTIFY_PLIES`] moves.
    ///
    /// Only entries whose whole move list is a prefix of the game qualify.
    /// The longest qualifying entry wins. When two entries have the same
    /// length the one listed first in the catalog is returned; this is a
    /// fixed policy, not a judgement about which name is more accurate.
    pub fn identify<S: AsRef<str>>(&self, moves: &[S]) -> Option<OpeningMatch> {
        let window = &moves[..moves.len().min(IDENTIFY_PLIES)];
        let mut best: Option<&OpeningEntry> = None;

        for entry in &self.entries {
            let depth = common_prefix(&entry.moves, window);
            if depth == 0 || depth != entry.moves.len() {
                continue;
            }
            if best.map_or(true, |b| depth > b.moves.len()) {
                best = Some(entry);
            }
        }

        best.map(|e| OpeningMatch {
            code: e.code.clone(),
            name: e.name.clone(),
            depth: e.moves.len(),
        })
    }

    /// The built-in table of common openings.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(code, name, moves)| OpeningEntry {
                code: code.to_string(),
                name: name.to_string(),
                moves: moves.split_whitespace().map(String::from).collect(),
            })
            .collect();
        Self { entries }
    }
}

fn common_prefix<S: AsRef<str>>(line: &[String], game: &[S]) -> usize {
    line.iter()
        .zip(game)
        .take_while(|(a, b)| normalize_san(a) == normalize_san(b.as_ref()))
        .count()
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("B00", "King's Pawn", "e4"),
    ("B01", "Scandinavian Defense", "e4 d5"),
    ("B02", "Alekhine's Defense", "e4 Nf6"),
    ("B04", "Alekhine Defense: Modern Variation", "e4 Nf6 d3"),
    ("B06", "Robatsch Defense", "e4 g6"),
    ("B07", "Pirc Defense", "e4 d6 d4 Nf6 Nc3 g6"),
    ("B10", "Caro-Kann Defense", "e4 c6"),
    ("B12", "Caro-Kann Defense: Advance Variation", "e4 c6 d4 d5 e5"),
    ("B15", "Caro-Kann Defense: Tartakower Variation", "e4 c6 d4 d5 Nc3 dxe4 Nxe4 Nf6 Nxf6+ exf6"),
    ("B20", "Sicilian Defense", "e4 c5"),
    ("B21", "Sicilian Defense: Smith-Morra Gambit", "e4 c5 d4 cxd4 c3"),
    ("B22", "Sicilian Defense: Alapin Variation", "e4 c5 c3"),
    ("B23", "Sicilian Defense: Closed", "e4 c5 Nc3"),
    ("B30", "Sicilian Defense: Old Sicilian", "e4 c5 Nf3 Nc6"),
    ("B40", "Sicilian Defense: French Variation", "e4 c5 Nf3 e6"),
    ("B50", "Sicilian Defense", "e4 c5 Nf3 d6"),
    ("B70", "Sicilian Defense: Dragon Variation", "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 g6"),
    ("B90", "Sicilian Defense: Najdorf Variation", "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 a6"),
    ("C00", "French Defense", "e4 e6"),
    ("C02", "French Defense: Advance Variation", "e4 e6 d4 d5 e5"),
    ("C10", "French Defense: Rubinstein Variation", "e4 e6 d4 d5 Nc3 dxe4"),
    ("C15", "French Defense: Winawer Variation", "e4 e6 d4 d5 Nc3 Bb4"),
    ("C20", "King's Pawn Game", "e4 e5"),
    ("C25", "Vienna Game", "e4 e5 Nc3"),
    ("C30", "King's Gambit", "e4 e5 f4"),
    ("C40", "King's Knight Opening", "e4 e5 Nf3"),
    ("C41", "Philidor Defense", "e4 e5 Nf3 d6"),
    ("C42", "Petrov's Defense", "e4 e5 Nf3 Nf6"),
    ("C44", "King's Pawn Game: Tayler Opening", "e4 e5 Nf3 Nc6 Be2"),
    ("C45", "Scotch Game", "e4 e5 Nf3 Nc6 d4"),
    ("C50", "Italian Game", "e4 e5 Nf3 Nc6 Bc4"),
    ("C53", "Italian Game: Classical Variation", "e4 e5 Nf3 Nc6 Bc4 Be7"),
    ("C60", "Ruy Lopez", "e4 e5 Nf3 Nc6 Bb5"),
    ("C65", "Ruy Lopez: Berlin Defense", "e4 e5 Nf3 Nc6 Bb5 Nf6"),
    ("C70", "Ruy Lopez: Morphy Defense", "e4 e5 Nf3 Nc6 Bb5 a6"),
    ("C80", "Ruy Lopez: Open", "e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6 O-O Nxe4"),
    ("C90", "Ruy Lopez: Spanish Torture", "e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6 O-O Be7"),
    ("D00", "Queen's Pawn Game", "d4"),
    ("D02", "London System", "d4 Nf6 Nf3 g6 Bf4"),
    ("D04", "Queen's Pawn Game: Colle System", "d4 Nf6 Nf3 e6 e3"),
    ("D10", "Slav Defense", "d4 d5 c4 c6"),
    ("D20", "Queen's Gambit Accepted", "d4 d5 c4 dxc4"),
    ("D30", "Queen's Gambit Declined", "d4 d5 c4 e6"),
    ("D35", "Queen's Gambit Declined: Exchange Variation", "d4 d5 c4 e6 Nc3 Nf6 cxd5"),
    ("D40", "Queen's Gambit Declined: Semi-Tarrasch", "d4 d5 c4 e6 Nc3 Nf6 Nf3 c5"),
    ("D50", "Queen's Gambit Declined: Modern Variation", "d4 d5 c4 e6 Nc3 Nf6 Bg5"),
    ("D60", "Queen's Gambit Declined: Orthodox Defense", "d4 d5 c4 e6 Nc3 Nf6 Bg5 Be7 e3 O-O Nf3"),
    ("D70", "Neo-Grünfeld Defense", "d4 Nf6 c4 g6 g3 Bg7 Bg2 d5"),
    ("D80", "Grünfeld Defense", "d4 Nf6 c4 g6 Nc3 d5"),
    ("D90", "Grünfeld Defense: Three Knights Variation", "d4 Nf6 c4 g6 Nc3 d5 Nf3"),
    ("E00", "Catalan Opening", "d4 Nf6 c4 e6 g3"),
    ("E10", "Indian Game", "d4 Nf6 c4 e6 Nf3"),
    ("E20", "Nimzo-Indian Defense", "d4 Nf6 c4 e6 Nc3 Bb4"),
    ("E30", "Nimzo-Indian Defense: Leningrad Variation", "d4 Nf6 c4 e6 Nc3 Bb4 Bg5"),
    ("E40", "Nimzo-Indian Defense: Normal Variation", "d4 Nf6 c4 e6 Nc3 Bb4 e3"),
    ("E60", "King's Indian Defense", "d4 Nf6 c4 g6 Nc3 Bg7 Nf3"),
    ("E70", "King's Indian Defense: Normal Variation", "d4 Nf6 c4 g6 Nc3 Bg7 e4"),
    ("E90", "King's Indian Defense: Orthodox Variation", "d4 Nf6 c4 g6 Nc3 Bg7 e4 d6 Nf3 O-O Be2"),
    ("A00", "Uncommon Opening", "b3"),
    ("A04", "Réti Opening", "Nf3"),
    ("A10", "English Opening", "c4"),
    ("A15", "English Opening: Anglo-Indian Defense", "c4 Nf6"),
    ("A20", "English Opening: King's English Variation", "c4 e5"),
    ("A30", "English Opening: Symmetrical Variation", "c4 c5"),
];
