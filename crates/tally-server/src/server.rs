//! `TallyServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use tally_identity::IdentityCodec;
use tally_registry::{GameCatalog, Registry};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatcher::{DispatchQueue, Dispatcher, DispatcherHandle, dispatch_channel};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::stats;
use crate::websocket::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Player and room stores plus the game catalog.
    pub registry: Arc<Registry>,
    /// Dispatcher queue.
    pub dispatcher: DispatcherHandle,
    /// Token codec.
    pub codec: Arc<IdentityCodec>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Next socket serial.
    pub next_serial: Arc<AtomicU64>,
}

/// The tally broker server.
#[derive(Debug)]
pub struct TallyServer {
    state: AppState,
    dispatcher: Dispatcher,
    queue: Option<DispatchQueue>,
}

impl TallyServer {
    /// Create a server over a fresh registry for `catalog`.
    pub fn new(config: ServerConfig, catalog: GameCatalog) -> Self {
        let registry = Arc::new(Registry::new(catalog));
        let (handle, queue) = dispatch_channel(config.dispatch_queue_capacity);
        Self {
            state: AppState {
                registry: Arc::clone(&registry),
                dispatcher: handle,
                codec: Arc::new(IdentityCodec::default()),
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                next_serial: Arc::new(AtomicU64::new(1)),
            },
            dispatcher: Dispatcher::new(registry),
            queue: Some(queue),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/v1/score/entry", get(ws_handler))
            .route("/v1/score/rooms/{room_id}", get(stats::check_room_handler))
            .route("/v1/score/boardgames", get(stats::boardgames_handler))
            .route("/v1/score/boardgames/{game_id}", get(stats::boardgame_handler))
            .route("/v1/score/statistics/rooms", get(stats::rooms_handler))
            .route("/v1/score/statistics/rooms/{room_id}", get(stats::room_handler))
            .route("/v1/score/statistics/connections", get(stats::connections_handler))
            .route(
                "/v1/score/statistics/connections/{connection_id}",
                get(stats::connection_handler),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the dispatcher worker. Returns `None` if it is already running.
    pub fn spawn_dispatcher(&mut self) -> Option<JoinHandle<()>> {
        let queue = self.queue.take()?;
        let dispatcher = self.dispatcher.clone();
        let cancel = self.state.shutdown.token();
        Some(tokio::spawn(dispatcher.run(queue, cancel)))
    }

    /// Bind, start the dispatcher and serve until shutdown.
    ///
    /// Returns the bound address and the server task. The dispatcher stops
    /// together with the server.
    pub async fn listen(mut self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let dispatcher = self.spawn_dispatcher();
        let app = self.router();
        let token = self.state.shutdown.token();
        info!(%addr, games = self.state.registry.catalog.len(), "tally server listening");

        let handle = tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                error!(error = %e, "server error");
            }
            if let Some(dispatcher) = dispatcher {
                let _ = dispatcher.await;
            }
            info!("tally server stopped");
        });

        Ok((addr, handle))
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.state.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Dispatcher queue handle.
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.state.dispatcher
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.shutdown.is_shutting_down(),
        state.registry.players.count(),
        state.registry.rooms.count(),
    ))
}
