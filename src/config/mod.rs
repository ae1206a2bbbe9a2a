//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! netmux.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → NetmuxConfig (validated, immutable)
//!     → NetworkManager / ReadinessMux / logging init
//! ```
//!
//! # Design Decisions
//! - Every field has a default so an empty file is a valid configuration
//! - Syntactic errors come from serde, semantic ones from validation.rs
//! - Config is read once at startup; there is no reload path

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::EndpointConfig;
pub use schema::MuxConfig;
pub use schema::NetmuxConfig;
pub use schema::NetworkConfig;
pub use schema::ObservabilityConfig;
