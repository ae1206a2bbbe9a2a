//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Init logging → NetworkManager::new → spawn mediator
//!
//! Shutdown (shutdown.rs):
//!     trigger() → mediator leaves its loop → join handle resolves
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
