//! Room snapshot and point fan-out to room members.

use std::sync::Arc;

use tally_core::{ConnectionId, PlayerInfo, PointResponse, RoomId, RoomResponse, RoomState, WsResponse};
use tally_registry::Registry;
use tracing::debug;

/// Pushes frames to every member of a room except the acting connection.
#[derive(Debug, Clone)]
pub struct NotificationFanout {
    registry: Arc<Registry>,
}

impl NotificationFanout {
    /// Fan-out over `registry`'s player handles.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Room payload with `is_wait` recomputed from the live member count.
    ///
    /// A game missing from the catalog never waits.
    pub fn room_response(&self, room_id: &RoomId, room: &RoomState) -> RoomResponse {
        let is_wait = self
            .registry
            .catalog
            .get(&room.game_id)
            .is_some_and(|entry| entry.is_wait(room.len()));
        RoomResponse {
            is_wait,
            room_id: room_id.clone(),
            room: room.clone(),
        }
    }

    /// Send a `NTFY` snapshot to every member but `except`. Returns the
    /// number of frames queued.
    pub fn notify_room(&self, room_id: &RoomId, room: &RoomState, except: &ConnectionId) -> usize {
        let response = WsResponse::notify(self.room_response(room_id, room));
        self.deliver(room, except, &response)
    }

    /// Send a `BRDC` of `points` from `sender` to every other member.
    pub fn broadcast_points(&self, room: &RoomState, sender: &PlayerInfo, points: &[i64]) -> usize {
        let response = WsResponse::points_broadcast(PointResponse {
            player: sender.clone(),
            points: points.to_vec(),
        });
        self.deliver(room, &sender.connection_id, &response)
    }

    fn deliver(&self, room: &RoomState, except: &ConnectionId, response: &WsResponse) -> usize {
        let frame = match serde_json::to_string(response) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                debug!(error = %e, "failed to serialize fan-out frame");
                return 0;
            }
        };

        let mut delivered = 0;
        for member in room.players.iter().filter(|p| &p.connection_id != except) {
            let Some(handle) = self.registry.players.handle(&member.connection_id) else {
                debug!(connection_id = %member.connection_id, "fan-out target has no session");
                continue;
            };
            if handle.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                debug!(connection_id = %member.connection_id, "fan-out frame dropped");
            }
        }
        delivered
    }
}
