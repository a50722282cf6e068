//! # tally-identity
//!
//! Connection tokens derived from a client's observed socket address.
//!
//! A token has the shape `shortId "-" compressedHex`:
//!
//! - `shortId` is an obfuscated rendering of the address, salted with the
//!   SHA-256 of its textual form. It is never decoded.
//! - `compressedHex` is the run-length compressed hex of the 2-byte port
//!   followed by the 16-byte IP. Validation expands it and compares the
//!   claimed address against the current socket.
//!
//! No state is kept. Anyone sharing the address can reproduce a token, so
//! this binds requests to a network path; it does not authenticate users.

#![deny(unsafe_code)]

pub mod address;
pub mod codec;
pub mod compress;
pub mod error;
pub mod shortid;

pub use codec::IdentityCodec;
pub use error::{IdentityError, Result};
