//! WebSocket wire protocol.
//!
//! Requests and responses are JSON text frames. Requests carry a method
//! opcode plus optional parameters; responses are a `{method, params}`
//! envelope whose `params` shape depends on the opcode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ErrorMessage, ProtocolError};
use crate::ids::{ConnectionId, GameId, RoomId};

/// Protocol opcode.
///
/// Unrecognized input parses as [`Method::None`] rather than failing, so a
/// frame with an unknown method still reaches the dispatcher and gets an
/// `InvalidMethod` reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// `BRDC`: point update fan-out.
    Broadcast,
    /// `CRET`: create a room.
    Create,
    /// `JOIN`: join an existing room.
    Join,
    /// `LEAV`: leave the current room.
    Leave,
    /// `CONN`: identity issued on connect.
    Connect,
    /// `EJCT`: session replaced by a newer connection from the same address.
    Eject,
    /// `NTFY`: room snapshot pushed to other members.
    Notify,
    /// `OK`: direct success reply.
    Ok,
    /// `ERR`: direct error reply.
    Error,
    /// Missing or unrecognized opcode.
    #[default]
    None,
}

impl Method {
    /// Wire opcode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broadcast => "BRDC",
            Self::Create => "CRET",
            Self::Join => "JOIN",
            Self::Leave => "LEAV",
            Self::Connect => "CONN",
            Self::Eject => "EJCT",
            Self::Notify => "NTFY",
            Self::Ok => "OK",
            Self::Error => "ERR",
            Self::None => "NONE",
        }
    }

    /// Parse an opcode, ignoring ASCII case. Never fails.
    pub fn parse(raw: &str) -> Self {
        const ALL: [Method; 9] = [
            Method::Broadcast,
            Method::Create,
            Method::Join,
            Method::Leave,
            Method::Connect,
            Method::Eject,
            Method::Notify,
            Method::Ok,
            Method::Error,
        ];
        let raw = raw.trim();
        ALL.into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or(Self::None)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::None, Self::parse))
    }
}

/// Inbound request frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsRequest {
    /// Requested operation.
    pub method: Method,
    /// Token issued by `CONN`.
    pub connection_id: ConnectionId,
    /// Target room.
    pub room_id: RoomId,
    /// Game the room is playing.
    pub game_id: GameId,
    /// Requested color token.
    pub player_color: String,
    /// Score values to broadcast.
    pub points: Vec<i64>,
}

/// One member of a room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Member's connection token.
    pub connection_id: ConnectionId,
    /// Member's color, unique within the room.
    pub player_color: String,
}

/// Room snapshot: game id plus members in insertion order.
///
/// Member order carries no meaning; removal swaps with the last entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Game being played.
    pub game_id: GameId,
    /// Current members.
    pub players: Vec<PlayerInfo>,
}

impl RoomState {
    /// A room whose sole member is `founder`.
    pub fn new(game_id: GameId, founder: PlayerInfo) -> Self {
        Self {
            game_id,
            players: vec![founder],
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whether `connection_id` is a member.
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.member(connection_id).is_some()
    }

    /// The member entry for `connection_id`.
    pub fn member(&self, connection_id: &ConnectionId) -> Option<&PlayerInfo> {
        self.players
            .iter()
            .find(|p| &p.connection_id == connection_id)
    }

    /// Whether any member already uses `color`.
    pub fn color_in_use(&self, color: &str) -> bool {
        self.players.iter().any(|p| p.player_color == color)
    }

    /// Remove `connection_id` by swapping it with the last entry.
    /// Returns the removed entry.
    pub fn swap_remove_player(&mut self, connection_id: &ConnectionId) -> Option<PlayerInfo> {
        let idx = self
            .players
            .iter()
            .position(|p| &p.connection_id == connection_id)?;
        Some(self.players.swap_remove(idx))
    }
}

/// Payload of CREATE/JOIN replies and NOTIFY pushes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomResponse {
    /// Member count is below the game's minimum.
    pub is_wait: bool,
    /// Room the snapshot belongs to.
    pub room_id: RoomId,
    /// Snapshot.
    pub room: RoomState,
}

/// Payload of BROADCAST echoes and fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointResponse {
    /// The sending member.
    pub player: PlayerInfo,
    /// Broadcast values.
    pub points: Vec<i64>,
}

/// Payload of the `CONN` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// Token to carry on later requests.
    pub connection_id: ConnectionId,
}

/// Response payload variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseParams {
    /// `CONN`.
    Connect(ConnectResponse),
    /// CREATE/JOIN reply or NOTIFY.
    Room(RoomResponse),
    /// BROADCAST echo or fan-out.
    Points(PointResponse),
    /// `ERR`.
    Error(ErrorMessage),
    /// `{}`.
    Empty {},
}

/// Outbound frame envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WsResponse {
    /// Result opcode.
    pub method: Method,
    /// Method-specific payload.
    pub params: ResponseParams,
}

impl WsResponse {
    /// `CONN` carrying the issued token.
    pub fn connected(connection_id: ConnectionId) -> Self {
        Self {
            method: Method::Connect,
            params: ResponseParams::Connect(ConnectResponse { connection_id }),
        }
    }

    /// `OK` with a room snapshot.
    pub fn room(room: RoomResponse) -> Self {
        Self {
            method: Method::Ok,
            params: ResponseParams::Room(room),
        }
    }

    /// `NTFY` with a room snapshot.
    pub fn notify(room: RoomResponse) -> Self {
        Self {
            method: Method::Notify,
            params: ResponseParams::Room(room),
        }
    }

    /// `OK` echo of a broadcast.
    pub fn points_echo(points: PointResponse) -> Self {
        Self {
            method: Method::Ok,
            params: ResponseParams::Points(points),
        }
    }

    /// `BRDC` fan-out of a broadcast.
    pub fn points_broadcast(points: PointResponse) -> Self {
        Self {
            method: Method::Broadcast,
            params: ResponseParams::Points(points),
        }
    }

    /// `OK` with an empty payload.
    pub fn ok_empty() -> Self {
        Self {
            method: Method::Ok,
            params: ResponseParams::Empty {},
        }
    }

    /// `EJCT` with an empty payload.
    pub fn eject() -> Self {
        Self {
            method: Method::Eject,
            params: ResponseParams::Empty {},
        }
    }

    /// `ERR` for a protocol error.
    pub fn error(err: ProtocolError) -> Self {
        Self {
            method: Method::Error,
            params: ResponseParams::Error(err.to_message()),
        }
    }
}

impl From<ProtocolError> for WsResponse {
    fn from(err: ProtocolError) -> Self {
        Self::error(err)
    }
}
