//! Per-service connection records.
//!
//! # Responsibilities
//! - Hold exactly one connection record per `ServiceId`
//! - Track the open link, the registered session and I/O timestamps
//! - Produce read-only snapshots for callers and tests

use std::net::SocketAddrV4;
use std::sync::Arc;

use tokio::time::Instant;

use crate::net::connect::Link;
use crate::net::service::{ProtocolSelector, ServiceId};
use crate::net::transport::TransportVariant;
use crate::radio::INVALID_SOCKET;
use crate::secure::{SessionHandle, WeakSession};

/// Whether a context currently owns a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Connection record for one service.
///
/// The session is held weakly: the caller that registered it owns it, and a
/// dropped session simply reads back as "not registered".
#[derive(Debug)]
pub struct NetworkContext {
    service: ServiceId,
    pub(crate) link: Option<Link>,
    pub(crate) session: Option<WeakSession>,
    pub(crate) last_send: Option<Instant>,
    pub(crate) last_recv: Option<Instant>,
}

impl NetworkContext {
    fn new(service: ServiceId) -> Self {
        Self {
            service,
            link: None,
            session: None,
            last_send: None,
            last_recv: None,
        }
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn state(&self) -> ConnectionState {
        if self.link.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Raw descriptor, or −1 when closed.
    pub fn socket(&self) -> i32 {
        self.link.map_or(INVALID_SOCKET, |link| link.descriptor.raw())
    }

    pub fn protocol(&self) -> Option<ProtocolSelector> {
        self.link.map(|link| link.protocol)
    }

    pub fn variant(&self) -> Option<TransportVariant> {
        self.link.map(|link| link.variant)
    }

    /// Upgrade the registered session if its owner still holds it.
    pub(crate) fn live_session(&self) -> Option<SessionHandle> {
        self.session.as_ref().and_then(|weak| weak.upgrade())
    }

    pub(crate) fn register_session(&mut self, session: &SessionHandle) {
        self.session = Some(Arc::downgrade(session));
    }

    pub(crate) fn open(&mut self, link: Link, now: Instant) {
        self.link = Some(link);
        self.last_send = Some(now);
        self.last_recv = Some(now);
    }

    /// Forget the link. The caller is responsible for closing the descriptor.
    pub(crate) fn take_link(&mut self) -> Option<Link> {
        self.last_send = None;
        self.last_recv = None;
        self.link.take()
    }
}

/// One context per service, indexed by `ServiceId` only.
#[derive(Debug)]
pub struct ContextTable {
    contexts: [NetworkContext; ServiceId::COUNT],
}

impl ContextTable {
    pub fn new() -> Self {
        Self {
            contexts: ServiceId::ALL.map(NetworkContext::new),
        }
    }

    pub fn get(&self, service: ServiceId) -> &NetworkContext {
        &self.contexts[service.index()]
    }

    pub fn get_mut(&mut self, service: ServiceId) -> &mut NetworkContext {
        &mut self.contexts[service.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkContext> {
        self.contexts.iter()
    }

    /// Number of contexts that currently own a socket.
    pub fn open_count(&self) -> usize {
        self.iter().filter(|ctx| ctx.state() == ConnectionState::Open).count()
    }
}

impl Default for ContextTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of one context, including its outstanding waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub service: ServiceId,
    pub state: ConnectionState,
    /// Raw descriptor, −1 when closed.
    pub socket: i32,
    pub protocol: Option<ProtocolSelector>,
    pub variant: Option<TransportVariant>,
    pub peer: Option<SocketAddrV4>,
    pub local: Option<SocketAddrV4>,
    pub has_session: bool,
    pub last_send: Option<Instant>,
    pub last_recv: Option<Instant>,
    pub rx_deadline: Option<Instant>,
    pub tx_deadline: Option<Instant>,
}

impl ContextSnapshot {
    pub(crate) fn capture(
        ctx: &NetworkContext,
        rx_deadline: Option<Instant>,
        tx_deadline: Option<Instant>,
    ) -> Self {
        Self {
            service: ctx.service,
            state: ctx.state(),
            socket: ctx.socket(),
            protocol: ctx.protocol(),
            variant: ctx.variant(),
            peer: ctx.link.map(|link| link.peer),
            local: ctx.link.and_then(|link| link.local),
            has_session: ctx.live_session().is_some(),
            last_send: ctx.last_send,
            last_recv: ctx.last_recv,
            rx_deadline,
            tx_deadline,
        }
    }
}
