//! In-memory adapters for the radio driver and the secure engine.
//!
//! # Data Flow
//! ```text
//! NetworkManager ──▶ SimulatedRadio (sockets, DNS table, echo peers, call log)
//! SecureSession  ──▶ ScriptedSession (scripted engine results, call log,
//!                    plaintext passthrough to its bio when unscripted)
//! ```
//!
//! Both adapters record every call so tests can assert on exact sequences,
//! and both back the demo binary.

pub mod radio;
pub mod session;

pub use radio::{FailStep, RadioCall, SimulatedRadio};
pub use session::{EngineCall, EngineOp, ScriptedSession};
