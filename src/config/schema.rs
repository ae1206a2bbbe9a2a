//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::service::{ProtocolSelector, ServiceId};
use crate::secure::bridge::{SecurePolicy, IDLE_RENEGOTIATION_THRESHOLD};
use crate::secure::DEFAULT_DATAGRAM_MTU;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NetmuxConfig {
    /// Connection and secure-session policy.
    pub network: NetworkConfig,

    /// Readiness multiplexer timing.
    pub mux: MuxConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Endpoints exercised by the demo binary.
    pub endpoints: Vec<EndpointConfig>,
}

/// Connection establishment and secure-session policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upper bound on the connect-in-progress loop, in seconds.
    /// Zero allows a single connect attempt.
    pub connect_timeout_secs: u64,

    /// Idle time after which a secured write renegotiates first.
    pub idle_renegotiation_secs: u64,

    /// Path MTU set on datagram sessions.
    pub datagram_mtu: u16,

    /// Attempts at a graceful close-notify before giving up.
    pub close_notify_attempts: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            idle_renegotiation_secs: IDLE_RENEGOTIATION_THRESHOLD.as_secs(),
            datagram_mtu: DEFAULT_DATAGRAM_MTU,
            close_notify_attempts: 8,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn secure_policy(&self) -> SecurePolicy {
        SecurePolicy {
            idle_threshold: Duration::from_secs(self.idle_renegotiation_secs),
            close_notify_attempts: self.close_notify_attempts,
        }
    }
}

/// Readiness multiplexer timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Added to the caller's timeout while waiting on its signal.
    pub wait_grace_ms: u64,

    /// Cap on a single readiness call so new waits are picked up.
    pub select_slice_ms: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            wait_grace_ms: 500,
            select_slice_ms: 50,
        }
    }
}

impl MuxConfig {
    pub fn wait_grace(&self) -> Duration {
        Duration::from_millis(self.wait_grace_ms)
    }

    pub fn select_slice(&self) -> Duration {
        Duration::from_millis(self.select_slice_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// A remote endpoint one service talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub service: ServiceId,

    pub host: String,

    pub port: u16,

    /// One of `udp`, `tcp`, `dtls`, `tls`.
    pub protocol: String,

    /// Local port to bind; absent or zero means no bind.
    #[serde(default)]
    pub local_port: Option<u16>,
}

impl EndpointConfig {
    pub fn selector(&self) -> Result<ProtocolSelector, String> {
        self.protocol.parse()
    }

    pub fn bind_port(&self) -> Option<u16> {
        self.local_port.filter(|p| *p != 0)
    }
}
