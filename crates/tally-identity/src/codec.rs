//! Token issuance and validation.

use std::net::SocketAddr;

use sha2::{Digest, Sha256};
use tally_core::ConnectionId;

use crate::address::WireAddress;
use crate::compress::{EXPANDED_LEN, compress, expand};
use crate::error::{IdentityError, Result};
use crate::shortid::{DEFAULT_ALPHABET, DEFAULT_MIN_LENGTH, ShortId};

/// Separator between the short id and the compressed address.
const TOKEN_SEPARATOR: char = '-';

/// Issues and checks address-bound connection tokens.
#[derive(Clone, Debug)]
pub struct IdentityCodec {
    alphabet: String,
    min_length: usize,
}

impl Default for IdentityCodec {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_owned(),
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

impl IdentityCodec {
    /// Issue a token for a textual `host:port` address.
    pub fn encode(&self, remote: &str) -> Result<ConnectionId> {
        let addr: SocketAddr = remote
            .parse()
            .map_err(|_| IdentityError::InvalidAddress(remote.to_owned()))?;
        self.encode_addr(addr)
    }

    /// Issue a token for `addr`.
    pub fn encode_addr(&self, addr: SocketAddr) -> Result<ConnectionId> {
        let wire = WireAddress::from_socket(addr);
        let salt = hex::encode(Sha256::digest(addr.to_string().as_bytes()));
        let short = ShortId::new(&self.alphabet, &salt, self.min_length)?.encode(wire.numeric_seed());
        let suffix = compress(&hex::encode(wire.to_bytes()));
        Ok(ConnectionId::new(format!("{short}{TOKEN_SEPARATOR}{suffix}")))
    }

    /// Recover the address a token claims. The short id is ignored.
    pub fn decode(&self, token: &str) -> Result<WireAddress> {
        let mut parts = token.split(TOKEN_SEPARATOR);
        let (Some(_short), Some(suffix), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(IdentityError::MalformedToken("expected exactly one '-'"));
        };
        let hex_str = expand(suffix).ok_or(IdentityError::MalformedToken("bad compressed suffix"))?;
        if hex_str.len() != EXPANDED_LEN {
            return Err(IdentityError::MalformedToken("suffix has wrong length"));
        }
        let bytes =
            hex::decode(&hex_str).map_err(|_| IdentityError::MalformedToken("suffix is not hex"))?;
        WireAddress::from_bytes(&bytes).ok_or(IdentityError::MalformedToken("suffix has wrong length"))
    }

    /// Whether `token` was issued for the address `remote` is connecting from.
    ///
    /// Any decode failure counts as a mismatch.
    pub fn validate(&self, token: &str, remote: SocketAddr) -> bool {
        self.decode(token).is_ok_and(|claimed| claimed.matches(remote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn known_token_for_loopback() {
        let codec = IdentityCodec::default();
        let token = codec.encode("127.0.0.1:8080").unwrap();
        assert_eq!(token.as_str(), "76ww0YV-1f90.20.ffff7f0.4.1");
    }

    #[test]
    fn encode_rejects_unparseable_address() {
        let codec = IdentityCodec::default();
        assert!(matches!(
            codec.encode("not-an-address"),
            Err(IdentityError::InvalidAddress(_))
        ));
    }

    #[test]
    fn validate_accepts_same_address() {
        let codec = IdentityCodec::default();
        let a = addr("192.168.1.20:51000");
        let token = codec.encode_addr(a).unwrap();
        assert!(codec.validate(token.as_str(), a));
    }

    #[test]
    fn validate_rejects_other_port_or_host() {
        let codec = IdentityCodec::default();
        let token = codec.encode_addr(addr("10.0.0.5:4000")).unwrap();
        assert!(!codec.validate(token.as_str(), addr("10.0.0.5:4001")));
        assert!(!codec.validate(token.as_str(), addr("10.0.0.6:4000")));
    }

    #[test]
    fn validate_ipv6() {
        let codec = IdentityCodec::default();
        let a = addr("[2001:db8::7]:443");
        let token = codec.encode_addr(a).unwrap();
        assert!(codec.validate(token.as_str(), a));
        assert!(!codec.validate(token.as_str(), addr("[2001:db8::8]:443")));
    }

    #[test]
    fn malformed_tokens_fail_closed() {
        let codec = IdentityCodec::default();
        let a = addr("127.0.0.1:8080");
        for bad in [
            "",
            "abcd",
            "abcd-",
            "a-b-c",
            "abcd-1f90.20.ffff7f0.4.1-x",
            "abcd-zz",
            "abcd-1f90.20",
            "abcd-1f90.20.ffff7f0.4.",
        ] {
            assert!(!codec.validate(bad, a), "accepted {bad:?}");
        }
    }

    #[test]
    fn decode_ignores_short_id() {
        let codec = IdentityCodec::default();
        let a = addr("127.0.0.1:8080");
        assert!(codec.validate("anything-1f90.20.ffff7f0.4.1", a));
    }

    #[test]
    fn same_address_yields_same_token() {
        let codec = IdentityCodec::default();
        let a = addr("172.16.0.9:60000");
        assert_eq!(codec.encode_addr(a).unwrap(), codec.encode_addr(a).unwrap());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

        fn any_addr() -> impl Strategy<Value = SocketAddr> {
            prop_oneof![
                (any::<u32>(), any::<u16>())
                    .prop_map(|(ip, port)| SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), port)),
                (any::<u128>(), any::<u16>())
                    .prop_map(|(ip, port)| SocketAddr::new(IpAddr::V6(Ipv6Addr::from(ip)), port)),
            ]
        }

        proptest! {
            #[test]
            fn encode_then_validate(a in any_addr()) {
                let codec = IdentityCodec::default();
                let token = codec.encode_addr(a).unwrap();
                prop_assert!(codec.validate(token.as_str(), a));
            }

            #[test]
            fn tampered_suffix_fails(a in any_addr(), pos in any::<prop::sample::Index>(), pick in 0usize..17) {
                const REPLACEMENTS: &[u8] = b"0123456789abcdef.";
                let codec = IdentityCodec::default();
                let token = codec.encode_addr(a).unwrap().as_str().to_owned();
                let dash = token.find('-').unwrap();
                let mut bytes = token.into_bytes();
                let i = dash + 1 + pos.index(bytes.len() - dash - 1);
                let mut replacement = REPLACEMENTS[pick];
                if replacement == bytes[i] {
                    replacement = REPLACEMENTS[(pick + 1) % REPLACEMENTS.len()];
                }
                bytes[i] = replacement;
                let tampered = String::from_utf8(bytes).unwrap();
                prop_assert!(!codec.validate(&tampered, a), "accepted {}", tampered);
            }
        }
    }
}
