//! Single-writer dispatcher.
//!
//! Every state-changing command goes through one bounded queue drained by
//! one task, which gives CREATE/JOIN/LEAVE/BROADCAST a total order across
//! all connections. Invariant checks and the writes they guard run in the
//! same step, so the registry itself never needs a cross-store lock.
//!
//! Client requests are submitted with [`DispatcherHandle::try_submit`] and
//! fail fast with [`DispatchError::Busy`] when the queue is full. Connect
//! and disconnect wait for capacity so cleanup is never lost.

mod actions;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tally_core::{ConnectionId, WsRequest};
use tally_registry::{ClientHandle, Registry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fanout::NotificationFanout;

/// Work item for the dispatcher.
#[derive(Debug)]
pub enum Command {
    /// A socket was upgraded and issued `connection_id`.
    Connect {
        /// Issued token.
        connection_id: ConnectionId,
        /// Write side of the new socket.
        client: Arc<ClientHandle>,
    },
    /// A decoded, address-checked client request.
    Request {
        /// The request.
        request: WsRequest,
        /// Socket the request arrived on.
        client: Arc<ClientHandle>,
    },
    /// A socket closed.
    Disconnect {
        /// Token the socket was issued.
        connection_id: ConnectionId,
        /// Serial of the closed socket.
        serial: u64,
    },
}

/// Submission failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The queue is full.
    #[error("dispatcher queue is full")]
    Busy,
    /// The dispatcher has stopped.
    #[error("dispatcher is not running")]
    Closed,
}

/// Cloneable sender side of the dispatcher queue.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Queue a command without waiting.
    pub fn try_submit(&self, cmd: Command) -> Result<(), DispatchError> {
        self.tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Busy,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    /// Queue a command, waiting for capacity.
    pub async fn submit(&self, cmd: Command) -> Result<(), DispatchError> {
        self.tx.send(cmd).await.map_err(|_| DispatchError::Closed)
    }

    /// Queue a command from a synchronous context such as `Drop`.
    ///
    /// Falls back to a spawned awaiting send when the queue is full.
    pub fn submit_detached(&self, cmd: Command) {
        match self.tx.try_send(cmd) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                if let Ok(rt) = tokio::runtime::Handle::try_current() {
                    let tx = self.tx.clone();
                    drop(rt.spawn(async move {
                        let _ = tx.send(cmd).await;
                    }));
                } else {
                    debug!("no runtime for detached submit, command dropped");
                }
            }
        }
    }

    /// Whether the dispatcher has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiver side of the dispatcher queue.
#[derive(Debug)]
pub struct DispatchQueue {
    rx: mpsc::Receiver<Command>,
}

impl DispatchQueue {
    /// Next command, or `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Next command if one is ready.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}

/// Bounded dispatcher queue.
pub fn dispatch_channel(capacity: usize) -> (DispatcherHandle, DispatchQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DispatcherHandle { tx }, DispatchQueue { rx })
}

/// The protocol state machine. Owns no state of its own; all state lives
/// in the injected [`Registry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    fanout: NotificationFanout,
}

impl Dispatcher {
    /// Dispatcher over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        let fanout = NotificationFanout::new(Arc::clone(&registry));
        Self { registry, fanout }
    }

    /// Drain `queue` until it closes or `cancel` fires.
    pub async fn run(self, mut queue: DispatchQueue, cancel: CancellationToken) {
        info!("dispatcher started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                cmd = queue.recv() => match cmd {
                    Some(cmd) => self.process(cmd),
                    None => break,
                },
            }
        }
        info!("dispatcher stopped");
    }

    /// Handle one command, containing any panic to that command.
    pub fn process(&self, cmd: Command) {
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| self.handle(cmd))) {
            error!(panic = %panic_message(&*panic), "dispatcher action panicked");
        }
    }

    fn handle(&self, cmd: Command) {
        match cmd {
            Command::Connect {
                connection_id,
                client,
            } => self.connect(connection_id, client),
            Command::Request { request, client } => self.request(&request, &client),
            Command::Disconnect {
                connection_id,
                serial,
            } => self.disconnect(&connection_id, serial),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_registry::GameCatalog;

    fn client(serial: u64) -> Arc<ClientHandle> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ClientHandle::new(serial, "127.0.0.1:1".parse().unwrap(), tx))
    }

    #[test]
    fn try_submit_reports_busy_when_full() {
        let (handle, _queue) = dispatch_channel(1);
        let disconnect = || Command::Disconnect {
            connection_id: ConnectionId::from("c"),
            serial: 1,
        };
        assert!(handle.try_submit(disconnect()).is_ok());
        assert_eq!(handle.try_submit(disconnect()), Err(DispatchError::Busy));
    }

    #[test]
    fn try_submit_reports_closed() {
        let (handle, queue) = dispatch_channel(1);
        drop(queue);
        assert!(handle.is_closed());
        let err = handle
            .try_submit(Command::Connect {
                connection_id: ConnectionId::from("c"),
                client: client(1),
            })
            .unwrap_err();
        assert_eq!(err, DispatchError::Closed);
    }

    #[tokio::test]
    async fn detached_submit_waits_for_capacity() {
        let (handle, mut queue) = dispatch_channel(1);
        let cmd = |serial| Command::Disconnect {
            connection_id: ConnectionId::from("c"),
            serial,
        };
        handle.submit_detached(cmd(1));
        handle.submit_detached(cmd(2));

        let mut serials = Vec::new();
        for _ in 0..2 {
            match queue.recv().await {
                Some(Command::Disconnect { serial, .. }) => serials.push(serial),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(serials, vec![1, 2]);
    }

    #[tokio::test]
    async fn run_drains_queue_until_handles_drop() {
        let registry = Arc::new(Registry::new(GameCatalog::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        let (handle, queue) = dispatch_channel(8);
        let task = tokio::spawn(dispatcher.run(queue, CancellationToken::new()));

        handle
            .submit(Command::Connect {
                connection_id: ConnectionId::from("c1"),
                client: client(1),
            })
            .await
            .unwrap();
        handle
            .submit(Command::Connect {
                connection_id: ConnectionId::from("c2"),
                client: client(2),
            })
            .await
            .unwrap();
        handle
            .submit(Command::Disconnect {
                connection_id: ConnectionId::from("c1"),
                serial: 1,
            })
            .await
            .unwrap();
        drop(handle);

        task.await.unwrap();
        assert_eq!(registry.players.count(), 1);
        assert!(registry.players.contains(&ConnectionId::from("c2")));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let dispatcher = Dispatcher::new(Arc::new(Registry::default()));
        let (handle, queue) = dispatch_channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        dispatcher.run(queue, cancel).await;
        assert!(handle.is_closed());
    }

    #[test]
    fn panic_message_extracts_text() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
