//! Protocol error codes reported to clients in `ERR` responses.

use serde::{Deserialize, Serialize};

/// A semantically invalid request. The connection stays open; the sender
/// receives an `ERR` frame carrying [`ProtocolError::code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProtocolError {
    /// The requested room does not exist.
    #[error("the requested room does not exist")]
    RoomNotFound,
    /// The connection is not registered.
    #[error("the requested connection does not exist")]
    ConnectionNotFound,
    /// The game id is not in the catalog.
    #[error("the requested board game is not supported")]
    BoardgameNotFound,
    /// The connection is not a member of the room.
    #[error("the connection has not joined the requested room")]
    NotInRoom,
    /// The method opcode was missing or not recognized.
    #[error("an invalid method was specified")]
    InvalidMethod,
    /// The connection token does not match the socket's address.
    #[error("an illegal connection_id was detected")]
    IllegalConnectionId,
    /// The connection already belongs to a room.
    #[error("the connection has already joined a room")]
    AlreadyInRoom,
    /// A room with this id already exists.
    #[error("the requested room already exists")]
    RoomExists,
    /// The room is playing a different game.
    #[error("the requested room is playing a different game")]
    GameMismatch,
    /// Another member of the room already uses this color.
    #[error("a player with the same color has already joined the room")]
    ColorInUse,
    /// The room already holds the game's maximum number of players.
    #[error("the requested room is full")]
    RoomFull,
    /// The catalog does not list this color for the game.
    #[error("the requested color is not available for this game")]
    UnsupportedColor,
    /// The frame could not be decoded as a request.
    #[error("the request could not be decoded")]
    MalformedRequest,
    /// The dispatcher queue is full.
    #[error("the server is busy, retry later")]
    ServerBusy,
}

impl ProtocolError {
    /// Wire code carried in the `error` field.
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomNotFound => "RoomNotFound",
            Self::ConnectionNotFound => "ConnectionNotFound",
            Self::BoardgameNotFound => "BoardgameNotFound",
            Self::NotInRoom => "NotInRoom",
            Self::InvalidMethod => "InvalidMethod",
            Self::IllegalConnectionId => "IllegalConnectionId",
            Self::AlreadyInRoom => "AlreadyInRoom",
            Self::RoomExists => "RoomExists",
            Self::GameMismatch => "GameMismatch",
            Self::ColorInUse => "ColorInUse",
            Self::RoomFull => "RoomFull",
            Self::UnsupportedColor => "UnsupportedColor",
            Self::MalformedRequest => "MalformedRequest",
            Self::ServerBusy => "ServerBusy",
        }
    }

    /// Build the `{error, message}` payload.
    pub fn to_message(self) -> ErrorMessage {
        ErrorMessage {
            error: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}

/// Error payload: `{error: code, message: human string}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Machine-readable code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl From<ProtocolError> for ErrorMessage {
    fn from(e: ProtocolError) -> Self {
        e.to_message()
    }
}
