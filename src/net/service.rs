//! Logical services and protocol selection.

use serde::{Deserialize, Serialize};

use crate::radio::SocketKind;

/// Logical network consumers. Each owns exactly one connection context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    TimeSync,
    DeviceManagement,
    Messaging,
    WebTransfer,
}

impl ServiceId {
    /// Number of services, fixed at build time.
    pub const COUNT: usize = 4;

    pub const ALL: [ServiceId; Self::COUNT] = [
        ServiceId::TimeSync,
        ServiceId::DeviceManagement,
        ServiceId::Messaging,
        ServiceId::WebTransfer,
    ];

    /// Slot in the context table.
    pub(crate) fn index(self) -> usize {
        match self {
            ServiceId::TimeSync => 0,
            ServiceId::DeviceManagement => 1,
            ServiceId::Messaging => 2,
            ServiceId::WebTransfer => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::TimeSync => "time_sync",
            ServiceId::DeviceManagement => "device_management",
            ServiceId::Messaging => "messaging",
            ServiceId::WebTransfer => "web_transfer",
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

/// IP family. Only V4 can be connected; V6 exists so selectors decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Security {
    Plain,
    Secured,
}

const PROTOCOL_BIT: u8 = 1 << 0;
const UDP_BIT: u8 = 1 << 1;
const TCP_BIT: u8 = 1 << 2;
const IPV6_BIT: u8 = 1 << 3;
const SECURITY_BIT: u8 = 1 << 4;

/// Transport × family × security chosen per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolSelector {
    pub transport: Transport,
    pub family: AddressFamily,
    pub security: Security,
}

impl ProtocolSelector {
    pub const UDP_V4: Self = Self::new(Transport::Udp, AddressFamily::V4, Security::Plain);
    pub const TCP_V4: Self = Self::new(Transport::Tcp, AddressFamily::V4, Security::Plain);
    pub const DTLS_V4: Self = Self::new(Transport::Udp, AddressFamily::V4, Security::Secured);
    pub const TLS_V4: Self = Self::new(Transport::Tcp, AddressFamily::V4, Security::Secured);

    pub const fn new(transport: Transport, family: AddressFamily, security: Security) -> Self {
        Self { transport, family, security }
    }

    pub fn is_secured(&self) -> bool {
        self.security == Security::Secured
    }

    pub fn socket_kind(&self) -> SocketKind {
        match self.transport {
            Transport::Udp => SocketKind::Datagram,
            Transport::Tcp => SocketKind::Stream,
        }
    }

    /// Compact bit encoding used on the wire to the configuration tooling.
    pub fn bits(&self) -> u8 {
        let mut bits = PROTOCOL_BIT;
        bits |= match self.transport {
            Transport::Udp => UDP_BIT,
            Transport::Tcp => TCP_BIT,
        };
        if self.family == AddressFamily::V6 {
            bits |= IPV6_BIT;
        }
        if self.is_secured() {
            bits |= SECURITY_BIT;
        }
        bits
    }

    /// Decode [`bits`](Self::bits). Rejects empty, unknown or ambiguous encodings.
    pub fn from_bits(bits: u8) -> Option<Self> {
        let known = PROTOCOL_BIT | UDP_BIT | TCP_BIT | IPV6_BIT | SECURITY_BIT;
        if bits & !known != 0 || bits & PROTOCOL_BIT == 0 {
            return None;
        }
        let transport = match (bits & UDP_BIT != 0, bits & TCP_BIT != 0) {
            (true, false) => Transport::Udp,
            (false, true) => Transport::Tcp,
            _ => return None,
        };
        let family = if bits & IPV6_BIT != 0 { AddressFamily::V6 } else { AddressFamily::V4 };
        let security = if bits & SECURITY_BIT != 0 { Security::Secured } else { Security::Plain };
        Some(Self::new(transport, family, security))
    }
}

impl std::fmt::Display for ProtocolSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match (self.transport, self.security) {
            (Transport::Udp, Security::Plain) => "udp",
            (Transport::Tcp, Security::Plain) => "tcp",
            (Transport::Udp, Security::Secured) => "dtls",
            (Transport::Tcp, Security::Secured) => "tls",
        };
        let family = match self.family {
            AddressFamily::V4 => "ip4",
            AddressFamily::V6 => "ip6",
        };
        write!(f, "{}/{}", name, family)
    }
}

impl std::str::FromStr for ProtocolSelector {
    type Err = String;

    /// Parses the IPv4 names used in configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Self::UDP_V4),
            "tcp" => Ok(Self::TCP_V4),
            "dtls" => Ok(Self::DTLS_V4),
            "tls" => Ok(Self::TLS_V4),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}
