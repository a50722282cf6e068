//! Settings type definitions.
//!
//! Every section is `#[serde(default)]` so partial JSON files work.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tally_logging::LoggingConfig;

use crate::errors::{Result, SettingsError};

/// Root settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallySettings {
    /// Network and queue limits.
    pub server: ServerSettings,
    /// Game catalog source.
    pub catalog: CatalogSettings,
    /// Log output.
    pub logging: LoggingConfig,
}

impl TallySettings {
    /// Check cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.dispatch_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.dispatch_queue_capacity must be positive".into(),
            ));
        }
        if s.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.max_send_queue must be positive".into(),
            ));
        }
        if s.heartbeat_timeout_secs < s.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeat_timeout_secs ({}) is below heartbeat_interval_secs ({})",
                s.heartbeat_timeout_secs, s.heartbeat_interval_secs
            )));
        }
        Ok(())
    }
}

/// Listener and per-connection limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. 0 picks a free port.
    pub port: u16,
    /// Outbound frames buffered per connection before drops.
    pub max_send_queue: usize,
    /// Requests buffered ahead of the dispatcher before `ServerBusy`.
    pub dispatch_queue_capacity: usize,
    /// Consecutive undecodable frames tolerated before closing.
    pub max_consecutive_frame_errors: u32,
    /// Seconds between pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before the socket is closed.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_send_queue: 256,
            dispatch_queue_capacity: 1024,
            max_consecutive_frame_errors: 8,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
        }
    }
}

/// Where the game catalog is read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Path to the catalog JSON file.
    pub path: PathBuf,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/catalog.json"),
        }
    }
}
