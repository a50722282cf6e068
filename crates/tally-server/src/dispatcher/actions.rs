//! Per-method handlers.
//!
//! Each handler checks its preconditions in a fixed order, then writes to
//! the registry and replies. Handlers return the protocol error to report;
//! the request path turns it into an `ERR` frame for the sender.

use std::sync::Arc;
use std::time::Instant;

use tally_core::{
    ConnectionId, Method, PlayerInfo, PointResponse, ProtocolError, RoomId, RoomState, WsRequest,
    WsResponse,
};
use tally_registry::{ClientHandle, PlayerSession};
use tracing::{debug, info, warn};

use super::Dispatcher;

type ActionResult = Result<(), ProtocolError>;

impl Dispatcher {
    pub(super) fn request(&self, req: &WsRequest, client: &ClientHandle) {
        let start = Instant::now();
        let result = self.route(req, client);
        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        let client_ip = client.remote_addr().ip();

        match result {
            Ok(()) => info!(
                %client_ip,
                connection_id = %req.connection_id,
                method = %req.method,
                room_id = %req.room_id,
                elapsed_us,
                "request handled"
            ),
            Err(err) => {
                warn!(
                    %client_ip,
                    connection_id = %req.connection_id,
                    method = %req.method,
                    room_id = %req.room_id,
                    elapsed_us,
                    error = err.code(),
                    "request rejected"
                );
                let _ = client.send_json(&WsResponse::error(err));
            }
        }
    }

    fn route(&self, req: &WsRequest, client: &ClientHandle) -> ActionResult {
        let session = self
            .registry
            .players
            .get(&req.connection_id)
            .filter(|s| s.is_serial(client.serial()))
            .ok_or(ProtocolError::ConnectionNotFound)?;

        match req.method {
            Method::Create => self.create(req, &session),
            Method::Join => self.join(req, &session),
            Method::Leave => self.leave(req, &session),
            Method::Broadcast => self.broadcast(req, &session),
            _ => Err(ProtocolError::InvalidMethod),
        }
    }

    fn create(&self, req: &WsRequest, session: &PlayerSession) -> ActionResult {
        if session.room_id.is_some() {
            return Err(ProtocolError::AlreadyInRoom);
        }
        if self.registry.rooms.contains(&req.room_id) {
            return Err(ProtocolError::RoomExists);
        }
        let entry = self
            .registry
            .catalog
            .get(&req.game_id)
            .ok_or(ProtocolError::BoardgameNotFound)?;
        if !entry.supports_color(&req.player_color) {
            return Err(ProtocolError::UnsupportedColor);
        }

        let room = RoomState::new(req.game_id.clone(), player_info(session, req));
        let _ = self.registry.rooms.set(req.room_id.clone(), room.clone());
        let _ = self
            .registry
            .players
            .set_room_id(&session.connection_id, Some(req.room_id.clone()));

        let response = self.fanout.room_response(&req.room_id, &room);
        let _ = session.handle.send_json(&WsResponse::room(response));
        Ok(())
    }

    fn join(&self, req: &WsRequest, session: &PlayerSession) -> ActionResult {
        if session.room_id.is_some() {
            return Err(ProtocolError::AlreadyInRoom);
        }
        let mut room = self
            .registry
            .rooms
            .get(&req.room_id)
            .ok_or(ProtocolError::RoomNotFound)?;
        if room.game_id != req.game_id {
            return Err(ProtocolError::GameMismatch);
        }
        if let Some(entry) = self.registry.catalog.get(&room.game_id) {
            if entry.is_full(room.len()) {
                return Err(ProtocolError::RoomFull);
            }
            if !entry.supports_color(&req.player_color) {
                return Err(ProtocolError::UnsupportedColor);
            }
        }
        if room.color_in_use(&req.player_color) {
            return Err(ProtocolError::ColorInUse);
        }

        room.players.push(player_info(session, req));
        let _ = self.registry.rooms.set(req.room_id.clone(), room.clone());
        let _ = self
            .registry
            .players
            .set_room_id(&session.connection_id, Some(req.room_id.clone()));

        let response = self.fanout.room_response(&req.room_id, &room);
        let _ = session.handle.send_json(&WsResponse::room(response));
        let _ = self
            .fanout
            .notify_room(&req.room_id, &room, &session.connection_id);
        Ok(())
    }

    fn leave(&self, req: &WsRequest, session: &PlayerSession) -> ActionResult {
        let mut room = self
            .registry
            .rooms
            .get(&req.room_id)
            .ok_or(ProtocolError::RoomNotFound)?;
        if room.swap_remove_player(&session.connection_id).is_none() {
            return Err(ProtocolError::NotInRoom);
        }

        let _ = self.registry.players.set_room_id(&session.connection_id, None);
        self.store_or_drop_room(&req.room_id, room, &session.connection_id);

        let _ = session.handle.send_json(&WsResponse::ok_empty());
        Ok(())
    }

    fn broadcast(&self, req: &WsRequest, session: &PlayerSession) -> ActionResult {
        let room = self
            .registry
            .rooms
            .get(&req.room_id)
            .ok_or(ProtocolError::RoomNotFound)?;
        if room.game_id != req.game_id {
            return Err(ProtocolError::GameMismatch);
        }
        let sender = room
            .member(&session.connection_id)
            .cloned()
            .ok_or(ProtocolError::NotInRoom)?;

        let _ = session.handle.send_json(&WsResponse::points_echo(PointResponse {
            player: sender.clone(),
            points: req.points.clone(),
        }));
        let _ = self.fanout.broadcast_points(&room, &sender, &req.points);
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    pub(super) fn connect(&self, connection_id: ConnectionId, client: Arc<ClientHandle>) {
        if let Some(previous) = self.registry.players.get(&connection_id) {
            if previous.is_serial(client.serial()) {
                debug!(%connection_id, "duplicate connect ignored");
                return;
            }
            warn!(
                %connection_id,
                old_serial = previous.handle.serial(),
                new_serial = client.serial(),
                "token already in use, ejecting older session"
            );
            let _ = previous.handle.send_json(&WsResponse::eject());
            if !previous.handle.close() {
                warn!(
                    %connection_id,
                    old_serial = previous.handle.serial(),
                    "older session's queue is full, terminating it"
                );
                previous.handle.terminate();
            }
            let _ = self.detach(&connection_id);
        }

        let client_ip = client.remote_addr().ip();
        let _ = self.registry.players.set(
            connection_id.clone(),
            PlayerSession::new(connection_id.clone(), client),
        );
        info!(%client_ip, %connection_id, method = %Method::Connect, "player connected");
    }

    pub(super) fn disconnect(&self, connection_id: &ConnectionId, serial: u64) {
        let Some(session) = self.registry.players.get(connection_id) else {
            debug!(%connection_id, "disconnect for unknown connection");
            return;
        };
        if !session.is_serial(serial) {
            debug!(%connection_id, serial, "stale disconnect ignored");
            return;
        }

        let room_id = self.detach(connection_id);
        let _ = self.registry.players.delete(connection_id);
        info!(
            client_ip = %session.handle.remote_addr().ip(),
            %connection_id,
            room_id = room_id.as_ref().map_or("", RoomId::as_str),
            dropped_messages = session.handle.drop_count(),
            "player disconnected"
        );
    }

    /// Remove `connection_id` from whichever room holds it, notifying the
    /// remaining members.
    fn detach(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        let (room_id, mut room) = self.registry.rooms.find_by_member(connection_id)?;
        let _ = room.swap_remove_player(connection_id);
        self.store_or_drop_room(&room_id, room, connection_id);
        Some(room_id)
    }

    fn store_or_drop_room(&self, room_id: &RoomId, room: RoomState, actor: &ConnectionId) {
        if room.is_empty() {
            let _ = self.registry.rooms.delete(room_id);
            debug!(%room_id, "room closed");
        } else {
            let _ = self.registry.rooms.set(room_id.clone(), room.clone());
            let _ = self.fanout.notify_room(room_id, &room, actor);
        }
    }
}

fn player_info(session: &PlayerSession, req: &WsRequest) -> PlayerInfo {
    PlayerInfo {
        connection_id: session.connection_id.clone(),
        player_color: req.player_color.clone(),
    }
}
