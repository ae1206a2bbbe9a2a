//! Raw-socket byte transport for the secure engine.

use std::net::SocketAddrV4;
use std::sync::Arc;

use crate::radio::{same_endpoint, Descriptor, DriverError, RadioDriver, SocketKind};
use crate::secure::{Bio, EngineError, SecureSession};

/// Engine transport over one driver socket.
///
/// Datagram sockets address every send to the current peer and adopt the
/// sender of each received datagram as the new peer.
pub struct SocketBio {
    driver: Arc<dyn RadioDriver>,
    descriptor: Descriptor,
    peer: SocketAddrV4,
    kind: SocketKind,
}

impl SocketBio {
    pub fn new(driver: Arc<dyn RadioDriver>, descriptor: Descriptor, peer: SocketAddrV4, kind: SocketKind) -> Self {
        Self { driver, descriptor, peer, kind }
    }
}

impl std::fmt::Debug for SocketBio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketBio")
            .field("descriptor", &self.descriptor)
            .field("peer", &self.peer)
            .field("kind", &self.kind)
            .finish()
    }
}

fn engine_code(err: DriverError, would_block: EngineError) -> EngineError {
    match err {
        DriverError::WouldBlock => would_block,
        other => EngineError::Transport(other),
    }
}

impl Bio for SocketBio {
    fn send(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        let sent = match self.kind {
            SocketKind::Datagram => self.driver.send_to(self.descriptor, buf, self.peer),
            SocketKind::Stream => self.driver.send(self.descriptor, buf),
        };
        sent.map_err(|e| engine_code(e, EngineError::WantWrite))
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        match self.kind {
            SocketKind::Datagram => {
                let (n, from) = self
                    .driver
                    .recv_from(self.descriptor, buf)
                    .map_err(|e| engine_code(e, EngineError::WantRead))?;
                if !same_endpoint(&self.peer, &from) {
                    tracing::trace!(descriptor = %self.descriptor, new = %from, "Engine peer changed");
                    self.peer = from;
                }
                Ok(n)
            }
            SocketKind::Stream => self
                .driver
                .recv(self.descriptor, buf)
                .map_err(|e| engine_code(e, EngineError::WantRead)),
        }
    }
}

/// Wire `session` to the socket and, for datagrams, set the path MTU.
pub fn bind_socket(
    session: &mut dyn SecureSession,
    driver: Arc<dyn RadioDriver>,
    descriptor: Descriptor,
    peer: SocketAddrV4,
    kind: SocketKind,
    datagram_mtu: u16,
) {
    session.set_bio(Box::new(SocketBio::new(driver, descriptor, peer, kind)));
    if kind == SocketKind::Datagram {
        session.set_mtu(datagram_mtu);
    }
    tracing::trace!(descriptor = %descriptor, peer = %peer, kind = ?kind, "Secure session bound to socket");
}
