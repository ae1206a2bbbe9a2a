//! The closed set of transport variants a context can be bound to.

use std::net::SocketAddrV4;

use crate::net::service::{ProtocolSelector, Security, Transport};
use crate::radio::{same_endpoint, Descriptor, DriverError, RadioDriver, SocketKind};

/// How `send`/`receive` reach the wire for one open context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportVariant {
    Udp,
    Tcp,
    Dtls,
    Tls,
}

impl TransportVariant {
    pub fn for_protocol(protocol: ProtocolSelector) -> Self {
        match (protocol.transport, protocol.security) {
            (Transport::Udp, Security::Plain) => TransportVariant::Udp,
            (Transport::Tcp, Security::Plain) => TransportVariant::Tcp,
            (Transport::Udp, Security::Secured) => TransportVariant::Dtls,
            (Transport::Tcp, Security::Secured) => TransportVariant::Tls,
        }
    }

    pub fn is_secured(&self) -> bool {
        matches!(self, TransportVariant::Dtls | TransportVariant::Tls)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, TransportVariant::Tcp | TransportVariant::Tls)
    }

    pub fn socket_kind(&self) -> SocketKind {
        if self.is_stream() {
            SocketKind::Stream
        } else {
            SocketKind::Datagram
        }
    }

    /// Push `buf` out on a plain socket.
    ///
    /// Stops early when the driver accepts nothing more. A would-block after
    /// some bytes went out reports the partial count instead of an error.
    pub(crate) fn plain_write(
        &self,
        driver: &dyn RadioDriver,
        descriptor: Descriptor,
        peer: SocketAddrV4,
        buf: &[u8],
    ) -> Result<usize, DriverError> {
        let mut offset = 0;
        while offset < buf.len() {
            let sent = match self.socket_kind() {
                SocketKind::Datagram => driver.send_to(descriptor, &buf[offset..], peer),
                SocketKind::Stream => driver.send(descriptor, &buf[offset..]),
            };
            match sent {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(DriverError::WouldBlock) if offset > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(offset)
    }

    /// Read from a plain socket. Datagram reads move `peer` to the sender.
    pub(crate) fn plain_read(
        &self,
        driver: &dyn RadioDriver,
        descriptor: Descriptor,
        peer: &mut SocketAddrV4,
        buf: &mut [u8],
    ) -> Result<usize, DriverError> {
        match self.socket_kind() {
            SocketKind::Datagram => {
                let (n, from) = driver.recv_from(descriptor, buf)?;
                if !same_endpoint(peer, &from) {
                    tracing::debug!(%descriptor, old = %peer, new = %from, "Datagram peer changed");
                    *peer = from;
                }
                Ok(n)
            }
            SocketKind::Stream => driver.recv(descriptor, buf),
        }
    }
}

impl std::fmt::Display for TransportVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportVariant::Udp => "udp",
            TransportVariant::Tcp => "tcp",
            TransportVariant::Dtls => "dtls",
            TransportVariant::Tls => "tls",
        };
        f.write_str(name)
    }
}
