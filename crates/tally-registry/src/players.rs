//! Connection → session store.

use std::sync::Arc;

use tally_core::{ConnectionId, RoomId};

use crate::handle::ClientHandle;
use crate::store::Store;

/// State of one live connection.
#[derive(Clone, Debug)]
pub struct PlayerSession {
    /// Token issued at connect.
    pub connection_id: ConnectionId,
    /// Room the player is in, if any.
    pub room_id: Option<RoomId>,
    /// Socket write handle.
    pub handle: Arc<ClientHandle>,
}

impl PlayerSession {
    /// Fresh session outside any room.
    pub fn new(connection_id: ConnectionId, handle: Arc<ClientHandle>) -> Self {
        Self {
            connection_id,
            room_id: None,
            handle,
        }
    }

    /// Whether this session belongs to the socket numbered `serial`.
    pub fn is_serial(&self, serial: u64) -> bool {
        self.handle.serial() == serial
    }
}

/// Player sessions keyed by connection token.
pub type PlayerStore = Store<ConnectionId, PlayerSession>;

impl Store<ConnectionId, PlayerSession> {
    /// Bind or unbind a player's room. Returns `false` if the connection
    /// is gone.
    pub fn set_room_id(&self, connection_id: &ConnectionId, room_id: Option<RoomId>) -> bool {
        self.update(connection_id, |session| session.room_id = room_id)
    }

    /// Socket handle for a connection.
    pub fn handle(&self, connection_id: &ConnectionId) -> Option<Arc<ClientHandle>> {
        self.get(connection_id).map(|s| s.handle)
    }
}
