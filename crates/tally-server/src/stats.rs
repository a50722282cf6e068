//! Read-only lookup and statistics endpoints.
//!
//! These read registry snapshots directly and never go through the
//! dispatcher. Each store is read under its own lock, so a response may
//! reflect a request that is mid-flight in the dispatcher.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{ConnectionId, GameId, PlayerInfo, ProtocolError, RoomId, RoomState};
use tally_registry::{GameCatalogEntry, PlayerSession, Registry};

use crate::server::AppState;

/// `GET /v1/score/rooms/{room_id}` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRoomResult {
    /// Whether the room is open.
    pub is_exist: bool,
    /// The room's game, empty when it does not exist.
    pub game_id: GameId,
}

/// One open room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    /// Room id.
    pub room_id: RoomId,
    /// Game played in the room.
    pub game_id: GameId,
    /// Catalog entry for the game.
    pub game_data: GameCatalogEntry,
    /// Members in join order, modulo removals.
    pub players: Vec<PlayerInfo>,
}

/// One live connection. Room fields are empty for unbound connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    /// Connection token.
    pub connection_id: ConnectionId,
    /// Bound room.
    pub room_id: RoomId,
    /// Game of the bound room.
    pub game_id: GameId,
    /// Catalog entry for that game.
    pub game_data: GameCatalogEntry,
    /// This connection's color in the room.
    pub player_color: String,
    /// Everyone else in the room.
    pub other_players: Vec<PlayerInfo>,
    /// When the socket connected.
    pub connected_at: DateTime<Utc>,
}

/// Protocol error rendered as HTTP 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError(pub ProtocolError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.0.to_message())).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Projections
// ─────────────────────────────────────────────────────────────────────────────

/// Whether `room_id` is open, and its game.
pub fn check_room(registry: &Registry, room_id: &RoomId) -> CheckRoomResult {
    match registry.rooms.get(room_id) {
        Some(room) => CheckRoomResult {
            is_exist: true,
            game_id: room.game_id,
        },
        None => CheckRoomResult {
            is_exist: false,
            game_id: GameId::default(),
        },
    }
}

/// The whole catalog, or the single entry for `game_id`.
pub fn boardgames(
    registry: &Registry,
    game_id: Option<&GameId>,
) -> Result<BTreeMap<GameId, GameCatalogEntry>, ProtocolError> {
    match game_id {
        None => Ok(registry
            .catalog
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()),
        Some(id) => {
            let entry = registry
                .catalog
                .get(id)
                .ok_or(ProtocolError::BoardgameNotFound)?;
            Ok(BTreeMap::from([(id.clone(), entry.clone())]))
        }
    }
}

/// All rooms sorted by id, or just `room_id`.
pub fn room_summaries(
    registry: &Registry,
    room_id: Option<&RoomId>,
) -> Result<Vec<RoomSummary>, ProtocolError> {
    let summarize = |id: RoomId, room: RoomState| RoomSummary {
        room_id: id,
        game_data: game_data(registry, &room.game_id),
        game_id: room.game_id,
        players: room.players,
    };

    match room_id {
        Some(id) => {
            let room = registry.rooms.get(id).ok_or(ProtocolError::RoomNotFound)?;
            Ok(vec![summarize(id.clone(), room)])
        }
        None => {
            let mut rooms = registry.rooms.snapshot();
            rooms.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(rooms.into_iter().map(|(id, room)| summarize(id, room)).collect())
        }
    }
}

/// All connections sorted by token, or just `connection_id`.
pub fn connection_summaries(
    registry: &Registry,
    connection_id: Option<&ConnectionId>,
) -> Result<Vec<ConnectionSummary>, ProtocolError> {
    match connection_id {
        Some(id) => {
            let session = registry
                .players
                .get(id)
                .ok_or(ProtocolError::ConnectionNotFound)?;
            Ok(vec![connection_summary(registry, &session)])
        }
        None => {
            let mut sessions = registry.players.snapshot();
            sessions.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(sessions
                .iter()
                .map(|(_, session)| connection_summary(registry, session))
                .collect())
        }
    }
}

fn connection_summary(registry: &Registry, session: &PlayerSession) -> ConnectionSummary {
    let unbound = || ConnectionSummary {
        connection_id: session.connection_id.clone(),
        room_id: RoomId::default(),
        game_id: GameId::default(),
        game_data: GameCatalogEntry::default(),
        player_color: String::new(),
        other_players: Vec::new(),
        connected_at: session.handle.connected_at(),
    };

    let Some(room_id) = &session.room_id else {
        return unbound();
    };
    let Some(room) = registry.rooms.get(room_id) else {
        return unbound();
    };

    let (mine, others): (Vec<PlayerInfo>, Vec<PlayerInfo>) = room
        .players
        .into_iter()
        .partition(|p| p.connection_id == session.connection_id);

    ConnectionSummary {
        connection_id: session.connection_id.clone(),
        room_id: room_id.clone(),
        game_data: game_data(registry, &room.game_id),
        game_id: room.game_id,
        player_color: mine.into_iter().next().map(|p| p.player_color).unwrap_or_default(),
        other_players: others,
        connected_at: session.handle.connected_at(),
    }
}

fn game_data(registry: &Registry, game_id: &GameId) -> GameCatalogEntry {
    registry.catalog.get(game_id).cloned().unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /v1/score/rooms/{room_id}
pub async fn check_room_handler(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Json<CheckRoomResult> {
    Json(check_room(&state.registry, &room_id))
}

/// GET /v1/score/boardgames
pub async fn boardgames_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<GameId, GameCatalogEntry>>, ApiError> {
    boardgames(&state.registry, None).map(Json).map_err(ApiError)
}

/// GET /v1/score/boardgames/{game_id}
pub async fn boardgame_handler(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<Json<BTreeMap<GameId, GameCatalogEntry>>, ApiError> {
    boardgames(&state.registry, Some(&game_id))
        .map(Json)
        .map_err(ApiError)
}

/// GET /v1/score/statistics/rooms
pub async fn rooms_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoomSummary>>, ApiError> {
    room_summaries(&state.registry, None).map(Json).map_err(ApiError)
}

/// GET /v1/score/statistics/rooms/{room_id}
pub async fn room_handler(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Vec<RoomSummary>>, ApiError> {
    room_summaries(&state.registry, Some(&room_id))
        .map(Json)
        .map_err(ApiError)
}

/// GET /v1/score/statistics/connections
pub async fn connections_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConnectionSummary>>, ApiError> {
    connection_summaries(&state.registry, None)
        .map(Json)
        .map_err(ApiError)
}

/// GET /v1/score/statistics/connections/{connection_id}
pub async fn connection_handler(
    State(state): State<AppState>,
    Path(connection_id): Path<ConnectionId>,
) -> Result<Json<Vec<ConnectionSummary>>, ApiError> {
    connection_summaries(&state.registry, Some(&connection_id))
        .map(Json)
        .map_err(ApiError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_registry::{ClientHandle, GameCatalog};
    use tokio::sync::mpsc;

    const CATALOG: &str = r#"{
        "catan": {"title": "Catan", "min_players": 3, "max_players": 4,
                  "colors": ["red", "blue", "white", "orange"]}
    }"#;

    fn player(id: &str, color: &str) -> PlayerInfo {
        PlayerInfo {
            connection_id: ConnectionId::from(id),
            player_color: color.to_owned(),
        }
    }

    fn session(id: &str, room: Option<&str>) -> PlayerSession {
        let (tx, _rx) = mpsc::channel(1);
        let handle = Arc::new(ClientHandle::new(1, "127.0.0.1:1".parse().unwrap(), tx));
        let mut s = PlayerSession::new(ConnectionId::from(id), handle);
        s.room_id = room.map(RoomId::from);
        s
    }

    /// `a` and `b` in room `r1`, `c` unbound.
    fn populated() -> Registry {
        let reg = Registry::new(GameCatalog::from_json_str(CATALOG).unwrap());
        let mut room = RoomState::new(GameId::from("catan"), player("a", "red"));
        room.players.push(player("b", "blue"));
        let _ = reg.rooms.set(RoomId::from("r1"), room);
        for (id, room) in [("a", Some("r1")), ("b", Some("r1")), ("c", None)] {
            let _ = reg.players.set(ConnectionId::from(id), session(id, room));
        }
        reg
    }

    #[test]
    fn check_room_reports_existence() {
        let reg = populated();
        let hit = check_room(&reg, &RoomId::from("r1"));
        assert!(hit.is_exist);
        assert_eq!(hit.game_id.as_str(), "catan");
        let miss = check_room(&reg, &RoomId::from("zz"));
        assert!(!miss.is_exist);
        assert!(miss.game_id.is_empty());
    }

    #[test]
    fn boardgames_lookup() {
        let reg = populated();
        assert_eq!(boardgames(&reg, None).unwrap().len(), 1);
        let one = boardgames(&reg, Some(&GameId::from("catan"))).unwrap();
        assert_eq!(one[&GameId::from("catan")].max_players, 4);
        assert_eq!(
            boardgames(&reg, Some(&GameId::from("chess"))),
            Err(ProtocolError::BoardgameNotFound)
        );
    }

    #[test]
    fn room_summaries_include_game_data() {
        let reg = populated();
        let all = room_summaries(&reg, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].game_data.title, "Catan");
        assert_eq!(all[0].players.len(), 2);
        assert_eq!(
            room_summaries(&reg, Some(&RoomId::from("zz"))),
            Err(ProtocolError::RoomNotFound)
        );
    }

    #[test]
    fn connection_summary_splits_self_from_others() {
        let reg = populated();
        let a = connection_summaries(&reg, Some(&ConnectionId::from("a"))).unwrap();
        assert_eq!(a[0].player_color, "red");
        assert_eq!(a[0].room_id.as_str(), "r1");
        assert_eq!(a[0].other_players, vec![player("b", "blue")]);
    }

    #[test]
    fn unbound_connection_has_empty_fields() {
        let reg = populated();
        let c = connection_summaries(&reg, Some(&ConnectionId::from("c"))).unwrap();
        assert!(c[0].room_id.is_empty());
        assert!(c[0].player_color.is_empty());
        assert!(c[0].other_players.is_empty());
        assert_eq!(c[0].game_data, GameCatalogEntry::default());
    }

    #[test]
    fn connection_list_is_sorted_and_complete() {
        let reg = populated();
        let all = connection_summaries(&reg, None).unwrap();
        let ids: Vec<&str> = all.iter().map(|c| c.connection_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(
            connection_summaries(&reg, Some(&ConnectionId::from("zz"))),
            Err(ProtocolError::ConnectionNotFound)
        );
    }

    #[test]
    fn connection_summary_reports_connect_time() {
        let before = Utc::now();
        let reg = populated();
        let after = Utc::now();
        for summary in connection_summaries(&reg, None).unwrap() {
            assert!(summary.connected_at >= before && summary.connected_at <= after);
        }
        let json = serde_json::to_value(&connection_summaries(&reg, None).unwrap()[2]).unwrap();
        assert!(json["connected_at"].is_string());
    }

    #[test]
    fn api_error_is_bad_request() {
        let resp = ApiError(ProtocolError::RoomNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
