//! Chess primitives shared by the analysis crates: game records, PGN text,
//! position replay and the opening catalog.

pub mod error;
pub mod game_data;
pub mod openings;
pub mod pgn;
pub mod position;

pub use error::{CatalogError, GameRecordError};
pub use game_data::{GameResult, RawGame};
pub use openings::{OpeningCatalog, OpeningEntry, OpeningMatch, CATALOG};
pub use position::{Position, Side};
