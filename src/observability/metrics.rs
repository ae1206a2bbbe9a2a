//! Metrics collection.
//!
//! # Metrics
//! - `netmux_connects_total` (counter): connect attempts by service, outcome
//! - `netmux_secure_recoveries_total` (counter): close/reset/handshake cycles by service, trigger
//! - `netmux_renegotiations_total` (counter): idle renegotiations by service, outcome
//! - `netmux_mux_rounds_total` (counter): readiness rounds by result
//!
//! # Design Decisions
//! - Label values are static strings, no per-call allocation
//! - The application decides whether to install an exporter

use crate::net::service::ServiceId;

pub fn record_connect(service: ServiceId, outcome: &'static str) {
    ::metrics::counter!(
        "netmux_connects_total",
        "service" => service.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_secure_recovery(service: ServiceId, trigger: &'static str) {
    ::metrics::counter!(
        "netmux_secure_recoveries_total",
        "service" => service.as_str(),
        "trigger" => trigger
    )
    .increment(1);
}

pub fn record_renegotiation(service: ServiceId, outcome: &'static str) {
    ::metrics::counter!(
        "netmux_renegotiations_total",
        "service" => service.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// `result` is one of `ready`, `idle`, `error`.
pub fn record_mux_round(result: &'static str) {
    ::metrics::counter!("netmux_mux_rounds_total", "result" => result).increment(1);
}
