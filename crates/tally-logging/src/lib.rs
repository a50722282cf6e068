//! # tally-logging
//!
//! `tracing` subscriber setup.
//!
//! One fmt layer writes to stderr in JSON, pretty or compact form. The
//! filter comes from `RUST_LOG` when set, otherwise from the configured
//! level plus per-module overrides.

#![deny(unsafe_code)]

mod config;

pub use config::{LogFormat, LoggingConfig};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured level or module override is not a valid directive.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Directive string that failed to parse.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Filter directive string for `config`, e.g. `info,tally_server=debug`.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.to_lowercase();
    for (module, level) in &config.module_levels {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(&level.to_lowercase());
    }
    directives
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured directives.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let base = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let layer = match config.format {
        LogFormat::Json => base
            .json()
            .with_ansi(false)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => base.pretty().with_ansi(config.ansi).with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_ansi(config.ansi).with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
