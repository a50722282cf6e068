//! Room id → room state store.

use tally_core::{ConnectionId, RoomId, RoomState};

use crate::store::Store;

/// Rooms keyed by client-chosen id.
pub type RoomStore = Store<RoomId, RoomState>;

impl Store<RoomId, RoomState> {
    /// Linear scan for the room containing `connection_id`.
    pub fn find_by_member(&self, connection_id: &ConnectionId) -> Option<(RoomId, RoomState)> {
        let mut found = None;
        self.for_each(|id, room| {
            if found.is_none() && room.contains(connection_id) {
                found = Some((id.clone(), room.clone()));
            }
        });
        found
    }
}
