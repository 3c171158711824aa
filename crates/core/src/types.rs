use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::{BindError, Result};

/// Length of the reserved field stamped into every datagram
pub const RESERVED_LEN: usize = 3;

/// Offset of the reserved field within a datagram
const RESERVED_OFFSET: usize = 1;

/// Network a destination is meant to be reached over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Udp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// Resolved network destination of a tunnel peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    pub address: SocketAddr,
    pub network: Network,
}

impl Destination {
    /// Destination carrying tunnel datagrams. IPv4-mapped IPv6 addresses
    /// are stored as plain IPv4.
    pub fn udp(address: SocketAddr) -> Self {
        Self {
            address: unmap_ipv4(address),
            network: Network::Udp,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// `host:port` form, IPv6 hosts in brackets
    pub fn net_addr(&self) -> String {
        self.address.to_string()
    }

    /// Endpoint key bytes: the raw address (4 or 16 bytes) followed by the
    /// port, low byte first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let port = self.port();
        let mut out = match self.ip() {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        out.push(port as u8);
        out.push((port >> 8) as u8);
        out
    }
}

fn unmap_ipv4(address: SocketAddr) -> SocketAddr {
    match address.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => SocketAddr::new(IpAddr::V4(v4), address.port()),
            None => address,
        },
        IpAddr::V4(_) => address,
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}

/// Address families a resolver is allowed to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpOption {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl IpOption {
    pub fn ipv4_only() -> Self {
        Self {
            ipv4: true,
            ipv6: false,
        }
    }

    pub fn ipv6_only() -> Self {
        Self {
            ipv4: false,
            ipv6: true,
        }
    }

    /// Whether `ip` belongs to an enabled family
    pub fn allows(&self, ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(_) => self.ipv4,
            IpAddr::V6(_) => self.ipv6,
        }
    }
}

impl Default for IpOption {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
        }
    }
}

/// Fixed 3-byte marker written at offset 1 of every outbound datagram.
///
/// Servers that multiplex several clients (or middleboxes that fingerprint
/// the tunnel protocol) key on these bytes. The receiving side always
/// zeroes them again before the tunnel engine sees the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedTag([u8; RESERVED_LEN]);

impl ReservedTag {
    pub fn new(bytes: [u8; RESERVED_LEN]) -> Self {
        Self(bytes)
    }

    /// Validate a configured tag: empty means no tag, anything other than
    /// exactly three bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Option<Self>> {
        match bytes.len() {
            0 => Ok(None),
            RESERVED_LEN => Ok(Some(Self([bytes[0], bytes[1], bytes[2]]))),
            n => Err(BindError::Config(format!(
                "reserved should be empty or {} bytes, got {}",
                RESERVED_LEN, n
            ))),
        }
    }

    pub fn as_bytes(&self) -> &[u8; RESERVED_LEN] {
        &self.0
    }

    /// Overwrite the reserved field. Packets of 3 bytes or less are left alone.
    pub fn stamp(&self, packet: &mut [u8]) {
        if packet.len() > RESERVED_LEN {
            packet[RESERVED_OFFSET..RESERVED_OFFSET + RESERVED_LEN].copy_from_slice(&self.0);
        }
    }

    /// Zero the reserved field. Packets of 3 bytes or less are left alone.
    pub fn clear(packet: &mut [u8]) {
        if packet.len() > RESERVED_LEN {
            packet[RESERVED_OFFSET..RESERVED_OFFSET + RESERVED_LEN].fill(0);
        }
    }
}
