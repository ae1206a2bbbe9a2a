//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters through the metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → whatever recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Every event carries the service label so per-service flows can be filtered
//! - No recorder is installed here; counters are no-ops until one is
//! - Counter names are stable and prefixed `netmux_`

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
