//! Branded string identifiers.
//!
//! Ids arrive from clients (room and game ids) or from the identity codec
//! (connection ids), so unlike generated ids these only wrap a raw string.
//! An empty id is representable: clients may omit fields they do not use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the raw string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id!(
    /// Connection identity token issued at CONNECT time.
    ConnectionId
);
branded_id!(
    /// Client-chosen room name.
    RoomId
);
branded_id!(
    /// Catalog key of a supported board game.
    GameId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_preserves_value() {
        let id = RoomId::new("room-42");
        assert_eq!(id.as_str(), "room-42");
        assert_eq!(id.to_string(), "room-42");
    }

    #[test]
    fn default_is_empty() {
        assert!(ConnectionId::default().is_empty());
        assert!(!GameId::from("catan").is_empty());
    }

    #[test]
    fn serde_is_transparent() {
        let id = GameId::from("catan");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"catan\"");
        let back: GameId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_from_str() {
        let id: ConnectionId = "abcd-0.7.".parse().unwrap();
        assert_eq!(id.as_str(), "abcd-0.7.");
    }
}
