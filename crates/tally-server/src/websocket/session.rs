//! WebSocket session lifecycle: upgrade, identity issue, read loop and
//! cleanup.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{FutureExt, SinkExt, StreamExt};
use tally_core::{ConnectionId, ProtocolError, WsResponse};
use tally_identity::IdentityCodec;
use tally_registry::{ClientHandle, Outbound};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::ingress::parse_frame;
use crate::config::ServerConfig;
use crate::dispatcher::{Command, DispatchError, DispatcherHandle, panic_message};
use crate::server::AppState;

/// How long the writer gets to flush queued frames and a close frame.
const CLOSE_FLUSH: Duration = Duration::from_secs(1);

const WRITER_STOPPED: &str = "writer stopped";

/// Everything one session needs besides the socket.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Token issued for this socket.
    pub connection_id: ConnectionId,
    /// Process-unique socket number.
    pub serial: u64,
    /// Observed peer address.
    pub remote: SocketAddr,
    /// Dispatcher queue.
    pub dispatcher: DispatcherHandle,
    /// Token codec for re-validating inbound frames.
    pub codec: Arc<IdentityCodec>,
    /// Queue and heartbeat limits.
    pub config: Arc<ServerConfig>,
    /// Server shutdown signal.
    pub cancel: CancellationToken,
}

/// `GET /v1/score/entry`: issue a token and upgrade.
///
/// The token is derived before the upgrade so an unusable address is
/// rejected with 400 and no session is created.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let connection_id = match state.codec.encode_addr(remote) {
        Ok(id) => id,
        Err(e) => {
            warn!(client_ip = %remote.ip(), error = %e, "cannot issue token, rejecting upgrade");
            return (
                StatusCode::BAD_REQUEST,
                Json(ProtocolError::IllegalConnectionId.to_message()),
            )
                .into_response();
        }
    };

    let ctx = SessionContext {
        connection_id,
        serial: state.next_serial.fetch_add(1, Ordering::Relaxed),
        remote,
        dispatcher: state.dispatcher.clone(),
        codec: Arc::clone(&state.codec),
        config: Arc::clone(&state.config),
        cancel: state.shutdown.token(),
    };

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ctx))
}

/// Run one client session until the socket closes, the heartbeat lapses or
/// the server shuts down.
///
/// 1. Registers the session with the dispatcher and sends `CONN`
/// 2. Forwards queued frames and periodic pings from a writer task
/// 3. Validates inbound frames and queues them for the dispatcher
/// 4. Submits exactly one disconnect, whatever ended the session
#[instrument(skip_all, fields(connection_id = %ctx.connection_id, client_ip = %ctx.remote.ip()))]
pub async fn run_ws_session(ws: WebSocket, ctx: SessionContext) {
    let (ws_tx, ws_rx) = ws.split();
    let (send_tx, send_rx) = mpsc::channel(ctx.config.max_send_queue.max(1));
    let client = Arc::new(ClientHandle::new(ctx.serial, ctx.remote, send_tx));

    let connect = Command::Connect {
        connection_id: ctx.connection_id.clone(),
        client: Arc::clone(&client),
    };
    if ctx.dispatcher.submit(connect).await.is_err() {
        warn!("dispatcher stopped, dropping new connection");
        return;
    }
    let guard = DisconnectGuard::new(ctx.dispatcher.clone(), ctx.connection_id.clone(), ctx.serial);
    let _ = client.send_json(&WsResponse::connected(ctx.connection_id.clone()));
    info!(serial = ctx.serial, "client connected");

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        Arc::clone(&client),
        ctx.config.heartbeat_interval(),
        ctx.config.heartbeat_timeout(),
    ));
    let reader = AssertUnwindSafe(read_loop(ws_rx, &client, &ctx)).catch_unwind();

    let reason = tokio::select! {
        result = reader => match result {
            Ok(reason) => reason,
            Err(panic) => {
                error!(panic = %panic_message(&*panic), "session read loop panicked");
                "panic"
            }
        },
        result = &mut writer => {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "session writer panicked");
                }
            }
            WRITER_STOPPED
        },
        () = ctx.cancel.cancelled() => "server shutdown",
    };

    if reason != WRITER_STOPPED {
        let _ = client.close();
        let _ = tokio::time::timeout(CLOSE_FLUSH, &mut writer).await;
    }
    writer.abort();
    guard.disconnect().await;
    info!(
        reason,
        age_secs = client.age().as_secs(),
        dropped_messages = client.drop_count(),
        "client disconnected"
    );
}

/// Read frames until the peer closes or a limit is hit. Returns why.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    client: &Arc<ClientHandle>,
    ctx: &SessionContext,
) -> &'static str {
    let max_errors = ctx.config.max_consecutive_frame_errors.max(1);
    let mut frame_errors: u32 = 0;

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket read error");
                return "read error";
            }
        };
        client.mark_alive();

        let text = match msg {
            Message::Text(t) => Ok(t.as_str().to_owned()),
            Message::Binary(data) => {
                String::from_utf8(data.to_vec()).map_err(|_| ProtocolError::MalformedRequest)
            }
            Message::Close(_) => return "client closed",
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match text.and_then(|t| parse_frame(&t, &ctx.codec, ctx.remote)) {
            Ok(request) => {
                frame_errors = 0;
                let method = request.method;
                let cmd = Command::Request {
                    request,
                    client: Arc::clone(client),
                };
                match ctx.dispatcher.try_submit(cmd) {
                    Ok(()) => {}
                    Err(DispatchError::Busy) => {
                        warn!(%method, "dispatcher queue full, rejecting request");
                        let _ = client.send_json(&WsResponse::error(ProtocolError::ServerBusy));
                    }
                    Err(DispatchError::Closed) => return "dispatcher stopped",
                }
            }
            Err(err) => {
                debug!(error = err.code(), "rejected inbound frame");
                let _ = client.send_json(&WsResponse::error(err));
                if err == ProtocolError::MalformedRequest {
                    frame_errors += 1;
                    if frame_errors >= max_errors {
                        warn!(frame_errors, "too many malformed frames, closing");
                        let _ = client.close();
                        return "malformed frames";
                    }
                }
            }
        }
    }
    "stream ended"
}

/// Forward queued frames to the socket and keep the heartbeat.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    client: Arc<ClientHandle>,
    interval: Duration,
    timeout: Duration,
) {
    let mut ping = tokio::time::interval(interval);
    // Skip the immediate first tick.
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(Outbound::Frame(text)) => {
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                None => break,
            },
            () = client.terminated() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            },
            _ = ping.tick() => {
                if !client.check_alive() && client.last_pong_elapsed() > timeout {
                    warn!(timeout_secs = timeout.as_secs(), "client unresponsive, disconnecting");
                    break;
                }
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws_tx.close().await;
}

/// Submits the session's disconnect exactly once.
///
/// The normal path awaits queue capacity through [`Self::disconnect`]. If
/// the session future is dropped or unwinds first, `Drop` submits instead.
struct DisconnectGuard {
    dispatcher: DispatcherHandle,
    connection_id: Option<ConnectionId>,
    serial: u64,
}

impl DisconnectGuard {
    fn new(dispatcher: DispatcherHandle, connection_id: ConnectionId, serial: u64) -> Self {
        Self {
            dispatcher,
            connection_id: Some(connection_id),
            serial,
        }
    }

    fn command(&self, connection_id: ConnectionId) -> Command {
        Command::Disconnect {
            connection_id,
            serial: self.serial,
        }
    }

    async fn disconnect(mut self) {
        if let Some(connection_id) = self.connection_id.clone() {
            let _ = self.dispatcher.submit(self.command(connection_id)).await;
            self.connection_id = None;
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(connection_id) = self.connection_id.take() {
            self.dispatcher.submit_detached(self.command(connection_id));
        }
    }
}
