//! Handshake, renegotiation and recovery policy for secured contexts.
//!
//! # Recovery
//! ```text
//! fatal engine error ──▶ close-notify ──▶ session reset ──▶ handshake
//! ```
//! Writes retry once after a successful recovery. Reads never retry; the
//! original error is returned once the channel has been rebuilt.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{NetError, NetResult};
use crate::net::service::ServiceId;
use crate::observability::metrics;
use crate::secure::{EngineError, SecureSession};

/// Elapsed time since the last successful send after which the channel is
/// re-validated before it is trusted with a write.
pub const IDLE_RENEGOTIATION_THRESHOLD: Duration = Duration::from_secs(120);

/// Tunables for the secure bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurePolicy {
    pub idle_threshold: Duration,
    pub close_notify_attempts: u32,
}

impl Default for SecurePolicy {
    fn default() -> Self {
        Self {
            idle_threshold: IDLE_RENEGOTIATION_THRESHOLD,
            close_notify_attempts: 8,
        }
    }
}

/// Run an engine step until it returns something other than a transient code.
async fn until_settled<T>(
    session: &mut dyn SecureSession,
    mut step: impl FnMut(&mut dyn SecureSession) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    loop {
        match step(&mut *session) {
            Err(e) if e.is_transient() => tokio::task::yield_now().await,
            other => return other,
        }
    }
}

pub async fn handshake(session: &mut dyn SecureSession) -> Result<(), EngineError> {
    until_settled(session, |s| s.handshake()).await
}

/// Graceful close with a bounded number of attempts on transient codes.
pub async fn close_notify(session: &mut dyn SecureSession, attempts: u32) -> Result<(), EngineError> {
    let mut last = EngineError::WantWrite;
    for _ in 0..attempts.max(1) {
        match session.close_notify() {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() => {
                last = e;
                tokio::task::yield_now().await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last)
}

/// Tear the association down and build a fresh one on the same session.
pub async fn recover(session: &mut dyn SecureSession, policy: &SecurePolicy) -> Result<(), EngineError> {
    if let Err(e) = close_notify(session, policy.close_notify_attempts).await {
        tracing::debug!(error = %e, "close-notify failed during recovery, continuing");
    }
    session.session_reset()?;
    handshake(session).await
}

/// Whether a write should be preceded by a renegotiation.
pub fn needs_renegotiation(
    connection_id_active: bool,
    last_send: Option<Instant>,
    now: Instant,
    threshold: Duration,
) -> bool {
    if connection_id_active {
        return false;
    }
    match last_send {
        Some(at) => now.saturating_duration_since(at) >= threshold,
        None => false,
    }
}

/// Renegotiate, falling back to a full rebuild. Returns whether the rebuild ran.
async fn revalidate(
    session: &mut dyn SecureSession,
    service: ServiceId,
    policy: &SecurePolicy,
) -> NetResult<bool> {
    let renegotiated = until_settled(session, |s| s.renegotiate()).await;
    let err = match renegotiated {
        Ok(()) => {
            metrics::record_renegotiation(service, "ok");
            return Ok(false);
        }
        Err(e) => e,
    };

    // Peers that refuse renegotiation still accept a fresh handshake.
    metrics::record_renegotiation(service, "fallback");
    tracing::info!(%service, error = %err, "Renegotiation failed, rebuilding secure session");
    match recover(session, policy).await {
        Ok(()) => {
            metrics::record_secure_recovery(service, "renegotiation");
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(%service, error = %e, "Secure session rebuild failed");
            Err(NetError::SecureRenegotiationFailure(e))
        }
    }
}

/// Write all of `buf` through the session.
///
/// At most one rebuild runs per call, whether triggered by a refused
/// renegotiation or by a failed write. A write that accepts nothing counts
/// as a failed write.
pub async fn secure_send(
    session: &mut dyn SecureSession,
    service: ServiceId,
    buf: &[u8],
    last_send: Option<Instant>,
    policy: &SecurePolicy,
) -> NetResult<usize> {
    let mut recovered = false;
    if needs_renegotiation(session.connection_id_active(), last_send, Instant::now(), policy.idle_threshold) {
        recovered = revalidate(session, service, policy).await?;
    }

    let mut offset = 0;
    while offset < buf.len() {
        let written = match session.write(&buf[offset..]) {
            Ok(0) => Err(EngineError::PeerClosed),
            other => other,
        };
        match written {
            Ok(n) => offset += n,
            Err(e) if e.is_transient() => tokio::task::yield_now().await,
            Err(e) if !recovered => {
                recovered = true;
                tracing::warn!(%service, error = %e, "Secure write failed, rebuilding session");
                if let Err(rebuild) = recover(session, policy).await {
                    tracing::warn!(%service, error = %rebuild, "Secure session rebuild failed");
                    return Err(NetError::WriteFailure(e.into()));
                }
                metrics::record_secure_recovery(service, "write");
            }
            Err(e) => return Err(NetError::WriteFailure(e.into())),
        }
    }
    Ok(offset)
}

/// Read one record's worth of plaintext.
///
/// `stream` selects TLS semantics, where an engine read timeout is handed
/// to the caller untouched.
pub async fn secure_receive(
    session: &mut dyn SecureSession,
    service: ServiceId,
    buf: &mut [u8],
    stream: bool,
    policy: &SecurePolicy,
) -> NetResult<usize> {
    let err = loop {
        match session.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.is_transient() || e == EngineError::ClientReconnect => {
                tokio::task::yield_now().await
            }
            Err(e) => break e,
        }
    };

    if stream && err == EngineError::Timeout {
        return Err(NetError::ReadFailure(err.into()));
    }

    tracing::warn!(%service, error = %err, "Secure read failed, rebuilding session");
    match recover(session, policy).await {
        Ok(()) => metrics::record_secure_recovery(service, "read"),
        Err(e) => tracing::warn!(%service, error = %e, "Secure session rebuild failed"),
    }
    Err(NetError::ReadFailure(err.into()))
}
