//! Which side of a game a named player had.
//!
//! Matching is a case-insensitive substring test on the recorded names, so
//! "carlsen" matches "Carlsen, Magnus". Two players sharing a surname are
//! not told apart; callers with platform account ids should filter games on
//! those before handing them over. When the name matches both sides the
//! player is taken to be White.

use chess_core::Side;

#[derive(Debug, Clone)]
pub struct PlayerMatch {
    needle: String,
}

impl PlayerMatch {
    pub fn new(player: &str) -> Self {
        Self {
            needle: player.trim().to_lowercase(),
        }
    }

    /// Side the player had, or `None` if neither name matches.
    pub fn side_in(&self, white: &str, black: &str) -> Option<Side> {
        if self.needle.is_empty() {
            return None;
        }
        if white.to_lowercase().contains(&self.needle) {
            Some(Side::White)
        } else if black.to_lowercase().contains(&self.needle) {
            Some(Side::Black)
        } else {
            None
        }
    }
}
