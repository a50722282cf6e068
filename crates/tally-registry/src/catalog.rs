//! Read-only table of supported games.
//!
//! Loaded once at startup from a JSON object keyed by game id:
//!
//! ```json
//! { "catan": { "title": "Catan", "min_players": 3, "max_players": 4,
//!              "colors": ["red", "blue", "white", "orange"] } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_core::GameId;

use crate::error::{CatalogError, Result};

/// Player and color limits for one game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCatalogEntry {
    /// Display title.
    pub title: String,
    /// Players needed before play starts.
    pub min_players: usize,
    /// Room capacity.
    pub max_players: usize,
    /// Allowed color tokens. Empty accepts any color.
    #[serde(default)]
    pub colors: Vec<String>,
}

impl GameCatalogEntry {
    /// Whether a room with `members` players is still waiting for more.
    pub fn is_wait(&self, members: usize) -> bool {
        members < self.min_players
    }

    /// Whether a room with `members` players is at capacity.
    pub fn is_full(&self, members: usize) -> bool {
        members >= self.max_players
    }

    /// Whether `color` may be used for this game.
    pub fn supports_color(&self, color: &str) -> bool {
        self.colors.is_empty() || self.colors.iter().any(|c| c == color)
    }

    fn validate(&self, id: &GameId) -> Result<()> {
        if self.min_players == 0 {
            return Err(CatalogError::InvalidEntry {
                game_id: id.to_string(),
                reason: "min_players must be at least 1".into(),
            });
        }
        if self.max_players < self.min_players {
            return Err(CatalogError::InvalidEntry {
                game_id: id.to_string(),
                reason: format!(
                    "max_players ({}) is below min_players ({})",
                    self.max_players, self.min_players
                ),
            });
        }
        Ok(())
    }
}

/// Supported games keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GameCatalog {
    games: BTreeMap<GameId, GameCatalogEntry>,
}

impl GameCatalog {
    /// Parse and validate catalog JSON.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let games: BTreeMap<GameId, GameCatalogEntry> = serde_json::from_str(raw)?;
        for (id, entry) in &games {
            entry.validate(id)?;
        }
        Ok(Self { games })
    }

    /// Read and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), games = catalog.len(), "game catalog loaded");
        Ok(catalog)
    }

    /// Entry for `id`.
    pub fn get(&self, id: &GameId) -> Option<&GameCatalogEntry> {
        self.games.get(id)
    }

    /// Whether `id` is a supported game.
    pub fn contains(&self, id: &GameId) -> bool {
        self.games.contains_key(id)
    }

    /// Number of games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// All entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&GameId, &GameCatalogEntry)> {
        self.games.iter()
    }
}
