//! # tally-server
//!
//! Axum HTTP + `WebSocket` server for the tally session broker.
//!
//! - `WebSocket` gateway: token issue at upgrade, per-frame address check,
//!   heartbeat, guaranteed disconnect cleanup
//! - Dispatcher: one worker draining a bounded queue, so every room and
//!   player mutation is totally ordered
//! - Notification fan-out of room snapshots and point broadcasts
//! - Read-only statistics and lookup endpoints over registry snapshots
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod fanout;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod stats;
pub mod websocket;

pub use config::ServerConfig;
pub use dispatcher::{Command, DispatchError, Dispatcher, DispatcherHandle};
pub use fanout::NotificationFanout;
pub use server::{AppState, TallyServer};
pub use shutdown::ShutdownCoordinator;
