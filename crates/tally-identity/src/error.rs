//! Identity codec errors.

use thiserror::Error;

/// Errors raised while issuing or decoding a connection token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The remote address could not be parsed as `host:port`.
    #[error("invalid remote address: {0}")]
    InvalidAddress(String),
    /// The token does not follow the `shortId-compressedHex` grammar.
    #[error("malformed connection token: {0}")]
    MalformedToken(&'static str),
    /// The short-id alphabet is unusable.
    #[error("invalid short-id alphabet: {0}")]
    InvalidAlphabet(String),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_display() {
        let err = IdentityError::InvalidAddress("nope".into());
        assert_eq!(err.to_string(), "invalid remote address: nope");
    }

    #[test]
    fn malformed_token_display() {
        let err = IdentityError::MalformedToken("missing separator");
        assert!(err.to_string().contains("missing separator"));
    }
}
