//! Catalog loading errors.

use thiserror::Error;

/// Errors that can occur when loading the game catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read the catalog file.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    /// The catalog is not a valid JSON object of entries.
    #[error("failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// An entry's limits are inconsistent.
    #[error("invalid catalog entry {game_id}: {reason}")]
    InvalidEntry {
        /// Offending game id.
        game_id: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
