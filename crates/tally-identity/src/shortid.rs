//! Salted integer obfuscation for the token prefix.
//!
//! The prefix is the Hashids encoding of one number. Output is
//! deterministic for a given salt and alphabet.

use harsh::Harsh;

use crate::error::{IdentityError, Result};

/// Alphabet without visually confusable characters.
pub const DEFAULT_ALPHABET: &str = "abcdefghkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXY0123456789";

/// Shortest prefix emitted.
pub const DEFAULT_MIN_LENGTH: usize = 4;

/// Salted encoder for one non-negative integer.
#[derive(Clone, Debug)]
pub struct ShortId {
    harsh: Harsh,
}

impl ShortId {
    /// Build an encoder over `alphabet`.
    ///
    /// The alphabet must be ASCII, free of spaces, and hold at least 16
    /// distinct characters.
    pub fn new(alphabet: &str, salt: &str, min_length: usize) -> Result<Self> {
        if !alphabet.is_ascii() || !salt.is_ascii() {
            return Err(IdentityError::InvalidAlphabet("must be ASCII".into()));
        }
        let harsh = Harsh::builder()
            .alphabet(alphabet)
            .salt(salt)
            .length(min_length)
            .build()
            .map_err(|e| IdentityError::InvalidAlphabet(e.to_string()))?;
        Ok(Self { harsh })
    }

    /// Encode `number`.
    pub fn encode(&self, number: u64) -> String {
        self.harsh.encode(&[number])
    }
}
