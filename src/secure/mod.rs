//! Secure transport bridge.
//!
//! # Data Flow
//! ```text
//! register_ssl_context ──▶ context keeps a Weak handle to the caller's session
//! connect (secured)    ──▶ bio.rs wires the session to the raw socket
//!                      ──▶ bridge.rs runs the handshake
//! send / receive       ──▶ bridge.rs: idle renegotiation, transient retry,
//!                          close-notify → reset → handshake recovery
//! ```
//!
//! # Design Decisions
//! - The engine (record layer, crypto, credentials) is external; only its
//!   lifecycle is modeled by [`SecureSession`].
//! - The bridge never owns or frees a session. Consumers build it, choose
//!   PSK or certificate credentials, and register it.
//! - A dropped secure association is expected on this link, so the bridge
//!   attempts exactly one automatic recovery before surfacing an error.

pub mod bio;
pub mod bridge;

use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::radio::DriverError;

/// Datagram path MTU set on DTLS sessions.
pub const DEFAULT_DATAGRAM_MTU: u16 = 1472;

/// Result codes reported by the secure engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine wants to read")]
    WantRead,
    #[error("engine wants to write")]
    WantWrite,
    #[error("asynchronous operation in progress")]
    AsyncInProgress,
    #[error("crypto operation in progress")]
    CryptoInProgress,
    /// Peer started a new handshake on the same association.
    #[error("client reconnect")]
    ClientReconnect,
    #[error("read timed out")]
    Timeout,
    #[error("peer sent close-notify")]
    PeerClosed,
    /// The byte transport below the engine failed.
    #[error("transport: {0}")]
    Transport(DriverError),
    #[error("fatal engine error {0}")]
    Fatal(i32),
}

impl EngineError {
    /// Codes that only mean "call again".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::WantRead
                | EngineError::WantWrite
                | EngineError::AsyncInProgress
                | EngineError::CryptoInProgress
        )
    }
}

/// Byte transport the engine reads and writes records through.
pub trait Bio: Send {
    /// Send raw bytes. Returns [`EngineError::WantWrite`] when the socket is full.
    fn send(&mut self, buf: &[u8]) -> Result<usize, EngineError>;

    /// Receive raw bytes. Returns [`EngineError::WantRead`] when nothing is queued.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;
}

/// Lifecycle of one TLS/DTLS session, as driven by the bridge.
///
/// Implementations are configured for the client role (stream or datagram)
/// and carry their credentials before they are registered.
pub trait SecureSession: Send {
    /// Attach the byte transport.
    fn set_bio(&mut self, bio: Box<dyn Bio>);

    /// Maximum datagram size the engine may emit.
    fn set_mtu(&mut self, mtu: u16);

    /// Expected server name for certificate checks.
    fn set_hostname(&mut self, host: &str) -> Result<(), EngineError>;

    fn handshake(&mut self) -> Result<(), EngineError>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError>;

    fn close_notify(&mut self) -> Result<(), EngineError>;

    /// Drop session state so a fresh handshake can run on the same object.
    fn session_reset(&mut self) -> Result<(), EngineError>;

    fn renegotiate(&mut self) -> Result<(), EngineError>;

    /// Whether the connection-ID extension is negotiated, letting the
    /// association survive address changes without a new handshake.
    fn connection_id_active(&self) -> bool;
}

/// Caller-owned session handle.
pub type SessionHandle = Arc<Mutex<dyn SecureSession>>;

/// What a network context keeps: it never extends the session's lifetime.
pub(crate) type WeakSession = Weak<Mutex<dyn SecureSession>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes() {
        for code in [
            EngineError::WantRead,
            EngineError::WantWrite,
            EngineError::AsyncInProgress,
            EngineError::CryptoInProgress,
        ] {
            assert!(code.is_transient(), "{code:?}");
        }
        assert!(!EngineError::Fatal(-0x7780).is_transient());
        assert!(!EngineError::Timeout.is_transient());
        assert!(!EngineError::ClientReconnect.is_transient());
    }
}
