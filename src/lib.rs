//! Network session multiplexer and secure-transport bridge.
//!
//! Turns one radio driver's socket primitives into per-service connection
//! contexts, multiplexes readiness waits across services through a single
//! mediator task, and drives a pluggable TLS/DTLS engine's handshake,
//! renegotiation and recovery lifecycle.

// Core subsystems
pub mod net;
pub mod mux;
pub mod secure;
pub mod radio;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

// In-memory adapters
pub mod sim;

pub use config::NetmuxConfig;
pub use error::{NetError, NetResult};
pub use lifecycle::Shutdown;
pub use net::{NetworkManager, ProtocolSelector, ServiceId};
pub use radio::RadioDriver;
pub use secure::{SecureSession, SessionHandle};
