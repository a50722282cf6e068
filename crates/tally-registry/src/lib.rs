//! # tally-registry
//!
//! In-memory state of the broker:
//!
//! - [`PlayerStore`]: connection token → [`PlayerSession`]
//! - [`RoomStore`]: room id → [`RoomState`](tally_core::RoomState)
//! - [`GameCatalog`]: read-only game limits loaded at startup
//!
//! The stores are locked independently and check nothing. Membership,
//! capacity and color rules are enforced by the single dispatcher before it
//! writes.

#![deny(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod handle;
pub mod players;
pub mod rooms;
pub mod store;

use std::sync::Arc;

pub use catalog::{GameCatalog, GameCatalogEntry};
pub use error::{CatalogError, Result};
pub use handle::{ClientHandle, Outbound};
pub use players::{PlayerSession, PlayerStore};
pub use rooms::RoomStore;
pub use store::Store;

/// Owned broker state, shared by the dispatcher and the read-only
/// statistics API.
#[derive(Debug, Default)]
pub struct Registry {
    /// Live connections.
    pub players: PlayerStore,
    /// Open rooms.
    pub rooms: RoomStore,
    /// Supported games.
    pub catalog: Arc<GameCatalog>,
}

impl Registry {
    /// Empty stores over `catalog`.
    pub fn new(catalog: GameCatalog) -> Self {
        Self {
            players: PlayerStore::new(),
            rooms: RoomStore::new(),
            catalog: Arc::new(catalog),
        }
    }
}
