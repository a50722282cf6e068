//! # tally-core
//!
//! Types shared by every tally crate:
//!
//! - [`ids`]: branded string ids for connections, rooms and games
//! - [`protocol`]: the WebSocket request/response envelopes and the closed
//!   [`Method`](protocol::Method) opcode enum
//! - [`errors`]: protocol error codes reported to clients

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;

pub use errors::{ErrorMessage, ProtocolError};
pub use ids::{ConnectionId, GameId, RoomId};
pub use protocol::{
    ConnectResponse, Method, PlayerInfo, PointResponse, ResponseParams, RoomResponse, RoomState,
    WsRequest, WsResponse,
};
