//! Socket handle held by each player session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, mpsc};

/// Item queued for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized text frame.
    Frame(Arc<String>),
    /// Close the socket after flushing earlier frames.
    Close,
}

/// Write side of one WebSocket connection.
///
/// Sends never block: a full or closed queue drops the frame and bumps
/// [`ClientHandle::drop_count`].
pub struct ClientHandle {
    serial: u64,
    remote_addr: SocketAddr,
    tx: mpsc::Sender<Outbound>,
    connected_at: DateTime<Utc>,
    started: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    terminate: Notify,
}

impl ClientHandle {
    /// Handle for the connection numbered `serial`.
    pub fn new(serial: u64, remote_addr: SocketAddr, tx: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            serial,
            remote_addr,
            tx,
            connected_at: Utc::now(),
            started: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            terminate: Notify::new(),
        }
    }

    /// Process-unique connection number. Distinguishes sockets that share
    /// a token.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Observed peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Wall-clock connect time.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a text frame. Returns `false` if it was dropped.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(Outbound::Frame(frame)).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize `value` and queue it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Ask the writer to close the socket.
    pub fn close(&self) -> bool {
        self.tx.try_send(Outbound::Close).is_ok()
    }

    /// Close the socket without waiting for queued frames. Unlike
    /// [`ClientHandle::close`] this cannot be lost to a full queue.
    pub fn terminate(&self) {
        self.terminate.notify_one();
    }

    /// Resolves once [`ClientHandle::terminate`] has been called.
    pub async fn terminated(&self) {
        self.terminate.notified().await;
    }

    /// Whether the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Frames dropped because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a pong or other inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Return and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong or connect.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Time since connect.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("serial", &self.serial)
            .field("remote_addr", &self.remote_addr)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}
