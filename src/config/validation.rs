//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (MTU, grace, attempts, ports)
//! - Reject endpoint lists that give one service two endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NetmuxConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::NetmuxConfig;
use crate::net::service::ServiceId;

/// Smallest datagram MTU the secure engine accepts.
const MIN_DATAGRAM_MTU: u16 = 64;

/// Largest UDP payload the radio can send in one frame.
const MAX_DATAGRAM_MTU: u16 = 1472;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("network.idle_renegotiation_secs must be greater than zero")]
    ZeroIdleThreshold,

    #[error("network.datagram_mtu {0} outside 64..=1472")]
    MtuOutOfRange(u16),

    #[error("network.close_notify_attempts must be greater than zero")]
    ZeroCloseAttempts,

    #[error("mux.select_slice_ms must be greater than zero")]
    ZeroSelectSlice,

    #[error("endpoint for {0} declared more than once")]
    DuplicateEndpoint(ServiceId),

    #[error("endpoint for {service}: {reason}")]
    InvalidEndpoint { service: ServiceId, reason: String },
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &NetmuxConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.network.idle_renegotiation_secs == 0 {
        errors.push(ValidationError::ZeroIdleThreshold);
    }
    let mtu = config.network.datagram_mtu;
    if !(MIN_DATAGRAM_MTU..=MAX_DATAGRAM_MTU).contains(&mtu) {
        errors.push(ValidationError::MtuOutOfRange(mtu));
    }
    if config.network.close_notify_attempts == 0 {
        errors.push(ValidationError::ZeroCloseAttempts);
    }
    if config.mux.select_slice_ms == 0 {
        errors.push(ValidationError::ZeroSelectSlice);
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        if !seen.insert(endpoint.service) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.service));
        }
        if endpoint.host.is_empty() {
            errors.push(ValidationError::InvalidEndpoint {
                service: endpoint.service,
                reason: "host is empty".into(),
            });
        }
        if endpoint.port == 0 {
            errors.push(ValidationError::InvalidEndpoint {
                service: endpoint.service,
                reason: "port must be non-zero".into(),
            });
        }
        if let Err(reason) = endpoint.selector() {
            errors.push(ValidationError::InvalidEndpoint { service: endpoint.service, reason });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
