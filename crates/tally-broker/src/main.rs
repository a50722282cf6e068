//! # tally-broker
//!
//! Broker binary: resolves settings, loads the game catalog and serves the
//! WebSocket and statistics endpoints until Ctrl-C.

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tally_logging::LogFormat;
use tally_registry::GameCatalog;
use tally_server::shutdown::SHUTDOWN_GRACE;
use tally_server::{ServerConfig, ShutdownCoordinator, TallyServer};
use tally_settings::TallySettings;
use tokio::task::JoinHandle;

/// Real-time score-sharing session broker.
#[derive(Parser, Debug)]
#[command(name = "tally-broker", version, about = "Real-time score-sharing session broker")]
struct Cli {
    /// Settings file (defaults to `~/.tally/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Game catalog JSON file.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Log output format: json, pretty or compact.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Settings file, then env vars, then these flags.
    fn resolve_settings(&self) -> Result<TallySettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(tally_settings::settings_path);
        let mut settings = tally_settings::load_settings_from_path(&path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut TallySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(catalog) = &self.catalog {
            settings.catalog.path.clone_from(catalog);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

/// Load the catalog and start serving. Returns the bound address, the
/// server task and its shutdown coordinator.
async fn start(
    settings: &TallySettings,
) -> Result<(SocketAddr, JoinHandle<()>, Arc<ShutdownCoordinator>)> {
    let catalog = GameCatalog::load(&settings.catalog.path).with_context(|| {
        format!(
            "failed to load game catalog from {}",
            settings.catalog.path.display()
        )
    })?;

    let server = TallyServer::new(ServerConfig::from(&settings.server), catalog);
    let shutdown = Arc::clone(server.shutdown());
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    Ok((addr, handle, shutdown))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;
    tally_logging::init_logging(&settings.logging).context("failed to initialize logging")?;

    let (addr, handle, shutdown) = start(&settings).await?;
    tracing::info!("tally broker listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    if shutdown.drain(handle, SHUTDOWN_GRACE).await {
        tracing::info!("shutdown complete");
    }
    Ok(())
}
