//! Radio driver port.
//!
//! # Data Flow
//! ```text
//! net::connect  ──▶ resolve / socket / bind / set_nonblocking / connect
//! net::transport ─▶ send / send_to / recv / recv_from
//! mux::mediator ──▶ select (the single readiness primitive)
//! net::manager ──▶ close
//! ```
//!
//! # Design Decisions
//! - The driver is an external collaborator; this module only names the
//!   operations the session layer needs from it.
//! - Descriptors are small non-negative integers handed out by the driver.
//! - Every call is synchronous and, once a socket is non-blocking, short.
//!   Only `select` may block, and only up to the timeout it is given.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use thiserror::Error;

/// Raw value reported for a context with no open socket.
pub const INVALID_SOCKET: i32 = -1;

/// A socket descriptor handed out by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(u16);

impl Descriptor {
    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i32 {
        i32::from(self.0)
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sd-{}", self.0)
    }
}

/// Socket type/protocol pair requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// `SOCK_DGRAM` / UDP.
    Datagram,
    /// `SOCK_STREAM` / TCP.
    Stream,
}

/// Errors reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Non-blocking operation has nothing to transfer yet.
    #[error("operation would block")]
    WouldBlock,

    /// Non-blocking connect has been issued and is still completing.
    #[error("connection in progress")]
    InProgress,

    /// Name could not be resolved.
    #[error("host not found")]
    HostNotFound,

    /// The descriptor is not (or no longer) open.
    #[error("bad descriptor")]
    BadDescriptor,

    /// Any other driver status code.
    #[error("driver status {0}")]
    Status(i16),
}

/// Descriptors reported ready by one readiness call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: Vec<Descriptor>,
    pub writable: Vec<Descriptor>,
}

impl Readiness {
    pub fn is_empty(&self) -> bool {
        self.readable.is_empty() && self.writable.is_empty()
    }
}

/// Socket primitives exposed by the radio driver.
///
/// # Thread Safety
///
/// One driver instance is shared by every caller task and the mediator.
/// Caller-side calls are serialized by the network manager's I/O lock;
/// `select` is issued by the mediator outside that lock, concurrently with
/// them, so implementations must be `Send + Sync`.
pub trait RadioDriver: Send + Sync + 'static {
    /// Resolve `host` to an IPv4 address.
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, DriverError>;

    /// Open a socket of the given kind.
    fn socket(&self, kind: SocketKind) -> Result<Descriptor, DriverError>;

    /// Bind to a local address.
    fn bind(&self, sd: Descriptor, local: SocketAddrV4) -> Result<(), DriverError>;

    /// Switch the socket to non-blocking mode.
    fn set_nonblocking(&self, sd: Descriptor) -> Result<(), DriverError>;

    /// Issue a non-blocking connect.
    ///
    /// Returns [`DriverError::InProgress`] while the connect is still completing;
    /// callers reissue the call until it settles.
    fn connect(&self, sd: Descriptor, peer: SocketAddrV4) -> Result<(), DriverError>;

    /// Send on a connected stream socket.
    fn send(&self, sd: Descriptor, buf: &[u8]) -> Result<usize, DriverError>;

    /// Send one datagram to `peer`.
    fn send_to(&self, sd: Descriptor, buf: &[u8], peer: SocketAddrV4) -> Result<usize, DriverError>;

    /// Receive from a stream socket.
    fn recv(&self, sd: Descriptor, buf: &mut [u8]) -> Result<usize, DriverError>;

    /// Receive one datagram, reporting its sender.
    fn recv_from(&self, sd: Descriptor, buf: &mut [u8]) -> Result<(usize, SocketAddrV4), DriverError>;

    /// Close the socket. The descriptor may be reused by the driver afterwards.
    fn close(&self, sd: Descriptor) -> Result<(), DriverError>;

    /// Block until one of the given descriptors is ready or `timeout` elapses.
    fn select(
        &self,
        read: &[Descriptor],
        write: &[Descriptor],
        timeout: Duration,
    ) -> Result<Readiness, DriverError>;
}

/// Compare two IPv4 endpoints by address and port.
pub fn same_endpoint(a: &SocketAddrV4, b: &SocketAddrV4) -> bool {
    a.ip() == b.ip() && a.port() == b.port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_raw_and_display() {
        let sd = Descriptor::new(3);
        assert_eq!(sd.raw(), 3);
        assert_eq!(sd.to_string(), "sd-3");
    }

    #[test]
    fn endpoints_compare_address_and_port() {
        let a = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5684);
        let b = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5684);
        let c = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5683);
        assert!(same_endpoint(&a, &b));
        assert!(!same_endpoint(&a, &c));
    }

    #[test]
    fn readiness_empty() {
        assert!(Readiness::default().is_empty());
        let r = Readiness { readable: vec![Descriptor::new(1)], writable: vec![] };
        assert!(!r.is_empty());
    }
}
