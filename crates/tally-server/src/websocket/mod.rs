//! WebSocket gateway: per-connection session and inbound frame checks.

pub mod ingress;
pub mod session;

pub use session::{SessionContext, run_ws_session, ws_handler};
