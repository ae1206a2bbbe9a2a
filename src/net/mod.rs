//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Caller task (one per ServiceId)
//!     → manager.rs (request API, I/O lock over the context table)
//!     → connect.rs (resolve → socket → bind → non-blocking → connect)
//!     → secure::bridge (handshake, renegotiation, recovery) when secured
//!     → transport.rs (plain datagram / stream read & write)
//!     → mux (readiness waits, outside the I/O lock)
//!
//! Context States:
//!     Closed (descriptor −1) → Open → Closed
//! ```
//!
//! # Design Decisions
//! - Contexts are indexed by `ServiceId` only, never by raw integers
//! - The transport variant is chosen once per connect and stored by value
//! - A failed connect always leaves the context closed and retryable

pub mod connect;
pub mod context;
pub mod manager;
pub mod service;
pub mod transport;

pub use context::{ConnectionState, ContextSnapshot, ContextTable, NetworkContext};
pub use manager::NetworkManager;
pub use service::{ProtocolSelector, ServiceId};
pub use transport::TransportVariant;
