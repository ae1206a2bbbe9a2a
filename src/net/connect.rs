//! Connection establisher.
//!
//! # Responsibilities
//! - Resolve the peer through the radio driver
//! - Open a socket of the kind the selector asks for
//! - Optionally bind a local port
//! - Complete a non-blocking connect, retrying while it is in progress
//!
//! # Design Decisions
//! - Every failing step closes whatever was opened before it
//! - The in-progress loop yields between attempts and is bounded by a timeout

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{NetError, NetResult};
use crate::mux::registry::deadline_after;
use crate::net::service::{AddressFamily, ProtocolSelector, ServiceId};
use crate::net::transport::TransportVariant;
use crate::radio::{Descriptor, DriverError, RadioDriver};

/// A connected socket and everything bound to it at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub descriptor: Descriptor,
    pub protocol: ProtocolSelector,
    pub variant: TransportVariant,
    pub peer: SocketAddrV4,
    pub local: Option<SocketAddrV4>,
}

/// Where the connect sequence should reach.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Zero is treated as "no bind".
    pub local_port: Option<u16>,
    pub protocol: ProtocolSelector,
}

/// Run resolve → socket → bind → non-blocking → connect.
///
/// On error nothing stays open.
pub async fn establish(
    driver: &dyn RadioDriver,
    service: ServiceId,
    target: Target<'_>,
    connect_timeout: Duration,
) -> NetResult<Link> {
    if target.protocol.family != AddressFamily::V4 {
        return Err(NetError::UnsupportedProtocol(target.protocol));
    }

    let ip = driver.resolve(target.host).map_err(|source| NetError::DnsFailure {
        host: target.host.to_string(),
        source,
    })?;
    let peer = SocketAddrV4::new(ip, target.port);
    let variant = TransportVariant::for_protocol(target.protocol);

    let descriptor = driver
        .socket(variant.socket_kind())
        .map_err(NetError::SocketCreateFailure)?;
    tracing::debug!(%service, %descriptor, %peer, %variant, "Socket opened");

    match finish(driver, service, descriptor, peer, target.local_port, connect_timeout).await {
        Ok(local) => Ok(Link {
            descriptor,
            protocol: target.protocol,
            variant,
            peer,
            local,
        }),
        Err(e) => {
            if let Err(close) = driver.close(descriptor) {
                tracing::warn!(%service, %descriptor, error = %close, "Close after failed connect failed");
            }
            Err(e)
        }
    }
}

async fn finish(
    driver: &dyn RadioDriver,
    service: ServiceId,
    descriptor: Descriptor,
    peer: SocketAddrV4,
    local_port: Option<u16>,
    connect_timeout: Duration,
) -> NetResult<Option<SocketAddrV4>> {
    let local = match local_port.filter(|p| *p != 0) {
        Some(port) => {
            let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
            driver
                .bind(descriptor, addr)
                .map_err(|source| NetError::BindFailure { port, source })?;
            Some(addr)
        }
        None => None,
    };

    if let Err(e) = driver.set_nonblocking(descriptor) {
        tracing::warn!(%service, %descriptor, error = %e, "Could not switch socket to non-blocking");
    }

    let deadline = deadline_after(Instant::now(), connect_timeout);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match driver.connect(descriptor, peer) {
            Ok(()) => break,
            Err(DriverError::InProgress) if Instant::now() < deadline => {
                tokio::task::yield_now().await;
            }
            Err(e) => {
                tracing::debug!(%service, %descriptor, attempts, error = %e, "Connect gave up");
                return Err(NetError::ConnectFailure(e));
            }
        }
    }
    tracing::trace!(%service, %descriptor, attempts, "Connect completed");
    Ok(local)
}
