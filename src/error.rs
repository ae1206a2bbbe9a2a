//! Errors returned by the request API.

use thiserror::Error;

use crate::net::service::{ProtocolSelector, ServiceId};
use crate::radio::DriverError;
use crate::secure::EngineError;

/// Where a read or write failed: in the raw driver or in the secure engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoFault {
    #[error("driver: {0}")]
    Driver(#[from] DriverError),
    #[error("secure engine: {0}")]
    Engine(#[from] EngineError),
}

/// Errors surfaced to consumers of the network manager.
///
/// Transient engine codes never appear here; they are absorbed by the
/// retry loops in the secure bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("DNS lookup for '{host}' failed: {source}")]
    DnsFailure {
        host: String,
        #[source]
        source: DriverError,
    },

    #[error("socket creation failed: {0}")]
    SocketCreateFailure(#[source] DriverError),

    #[error("bind to local port {port} failed: {source}")]
    BindFailure {
        port: u16,
        #[source]
        source: DriverError,
    },

    #[error("connect failed: {0}")]
    ConnectFailure(#[source] DriverError),

    #[error("secure handshake failed: {0}")]
    SecureHandshakeFailure(#[source] EngineError),

    /// Renegotiation and the full-handshake fallback both failed.
    #[error("secure renegotiation failed: {0}")]
    SecureRenegotiationFailure(#[source] EngineError),

    /// Graceful close failed; the socket was closed anyway.
    #[error("secure close failed: {0}")]
    SecureCloseFailure(#[source] EngineError),

    /// The driver refused to close the socket; the context is closed anyway.
    #[error("socket close failed: {0}")]
    CloseFailure(#[source] DriverError),

    #[error("read failed: {0}")]
    ReadFailure(#[source] IoFault),

    #[error("write failed: {0}")]
    WriteFailure(#[source] IoFault),

    #[error("connection is closed")]
    Closed,

    #[error("protocol {0} is not supported")]
    UnsupportedProtocol(ProtocolSelector),

    #[error("no secure session registered for {0}")]
    SessionNotRegistered(ServiceId),
}

impl NetError {
    /// True when a plain read or write found nothing to transfer yet.
    /// Callers typically wait for readiness and retry.
    pub fn is_would_block(&self) -> bool {
        matches!(
            self,
            NetError::ReadFailure(IoFault::Driver(DriverError::WouldBlock))
                | NetError::WriteFailure(IoFault::Driver(DriverError::WouldBlock))
        )
    }
}

/// Result type for network manager operations.
pub type NetResult<T> = Result<T, NetError>;
