//! Remote address normalisation.

use std::net::{IpAddr, SocketAddr};

use crate::error::{IdentityError, Result};

/// A remote address reduced to its 16-byte IP form and port.
///
/// IPv4 addresses are stored IPv4-mapped (`::ffff:a.b.c.d`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireAddress {
    /// 16-byte big-endian IP.
    pub ip: [u8; 16],
    /// Port.
    pub port: u16,
}

impl WireAddress {
    /// Normalise a socket address.
    pub fn from_socket(addr: SocketAddr) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        };
        Self {
            ip,
            port: addr.port(),
        }
    }

    /// Parse textual `host:port` (`[v6]:port` for IPv6).
    pub fn parse(remote: &str) -> Result<Self> {
        remote
            .parse::<SocketAddr>()
            .map(Self::from_socket)
            .map_err(|_| IdentityError::InvalidAddress(remote.to_owned()))
    }

    /// Sum of the four big-endian 32-bit words of the IP plus the port.
    pub fn numeric_seed(&self) -> u64 {
        let words: u64 = self
            .ip
            .chunks_exact(4)
            .map(|w| u64::from(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
            .sum();
        words + u64::from(self.port)
    }

    /// 18-byte buffer: port then IP, both big-endian.
    pub fn to_bytes(&self) -> [u8; 18] {
        let mut buf = [0u8; 18];
        buf[..2].copy_from_slice(&self.port.to_be_bytes());
        buf[2..].copy_from_slice(&self.ip);
        buf
    }

    /// Inverse of [`WireAddress::to_bytes`].
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != 18 {
            return None;
        }
        let mut ip = [0u8; 16];
        ip.copy_from_slice(&buf[2..]);
        Some(Self {
            ip,
            port: u16::from_be_bytes([buf[0], buf[1]]),
        })
    }

    /// The IP, with IPv4-mapped addresses shown as IPv4.
    pub fn ip_addr(&self) -> IpAddr {
        IpAddr::from(self.ip).to_canonical()
    }

    /// Whether this address names the same host and port as `addr`.
    pub fn matches(&self, addr: SocketAddr) -> bool {
        self.port == addr.port() && self.ip_addr() == addr.ip().to_canonical()
    }
}
