//! Readiness multiplexer.
//!
//! # Data Flow
//! ```text
//! caller task                         mediator task
//! ───────────                         ─────────────
//! wait_readable(service, t)
//!   → clear own signal
//!   → registry: rx deadline = now+t ─▶ Idle: parked on wake
//!   → wake.notify                  ─▶ Waiting: plan = min remaining deadline
//!   → take signal (t + grace)         driver.select(read, write, plan)
//!                                  ◀─ Dispatching: clear deadline, give signal
//! ```
//!
//! # Design Decisions
//! - The radio exposes exactly one readiness primitive, so only the mediator
//!   calls it; callers never poll the driver directly.
//! - The registry has its own narrow lock, separate from the I/O lock, so a
//!   long wait on one service never blocks another service's connect/send/close.
//! - A failed readiness call counts as "nothing ready"; the mediator only stops
//!   on shutdown.
//! - Expired deadlines are dropped silently; the waiting caller sees its own
//!   timeout.

pub mod mediator;
pub mod registry;
pub mod signal;

pub use mediator::ReadinessMux;
pub use registry::{Direction, WaitPlan, WaitRegistry};
pub use signal::BinarySignal;
