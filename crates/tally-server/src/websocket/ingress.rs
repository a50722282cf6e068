//! Inbound frame decoding and address binding.

use std::net::SocketAddr;

use tally_core::{ProtocolError, WsRequest};
use tally_identity::IdentityCodec;

/// Decode a text frame and check its token against the socket's address.
///
/// Undecodable JSON is [`ProtocolError::MalformedRequest`]; a token that
/// does not expand to `remote` is [`ProtocolError::IllegalConnectionId`].
pub fn parse_frame(
    text: &str,
    codec: &IdentityCodec,
    remote: SocketAddr,
) -> Result<WsRequest, ProtocolError> {
    let request: WsRequest =
        serde_json::from_str(text).map_err(|_| ProtocolError::MalformedRequest)?;
    if !codec.validate(request.connection_id.as_str(), remote) {
        return Err(ProtocolError::IllegalConnectionId);
    }
    Ok(request)
}
