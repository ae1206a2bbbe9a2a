//! Request API over the context table.
//!
//! # Responsibilities
//! - connect / send / receive / close per `ServiceId`
//! - Secure session registration and bio binding
//! - Readiness waits through the multiplexer
//!
//! # Locking
//! The I/O lock guards the context table and every driver call made on a
//! caller's behalf. connect, send, receive and close hold it for their whole
//! non-blocking sequence, including engine calls, which take the session lock
//! second. Readiness waits never touch it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{NetmuxConfig, NetworkConfig};
use crate::error::{NetError, NetResult};
use crate::mux::{Direction, ReadinessMux};
use crate::net::connect::{establish, Link, Target};
use crate::net::context::{ContextSnapshot, ContextTable, NetworkContext};
use crate::net::service::{ProtocolSelector, ServiceId};
use crate::net::transport::TransportVariant;
use crate::observability::metrics;
use crate::radio::RadioDriver;
use crate::secure::bio::bind_socket;
use crate::secure::bridge::{self, SecurePolicy};
use crate::secure::{SecureSession, SessionHandle};

/// Owner of every service's connection, shared by all caller tasks.
pub struct NetworkManager {
    driver: Arc<dyn RadioDriver>,
    table: Mutex<ContextTable>,
    mux: Arc<ReadinessMux>,
    policy: SecurePolicy,
    connect_timeout: Duration,
    datagram_mtu: u16,
}

impl NetworkManager {
    pub fn new(driver: Arc<dyn RadioDriver>, config: &NetmuxConfig) -> Self {
        Self::with_network(driver, &config.network, Arc::new(ReadinessMux::new(&config.mux)))
    }

    fn with_network(driver: Arc<dyn RadioDriver>, network: &NetworkConfig, mux: Arc<ReadinessMux>) -> Self {
        Self {
            driver,
            table: Mutex::new(ContextTable::new()),
            mux,
            policy: network.secure_policy(),
            connect_timeout: network.connect_timeout(),
            datagram_mtu: network.datagram_mtu,
        }
    }

    /// Start the readiness mediator on the current runtime.
    pub fn spawn_mediator(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.mux).run(Arc::clone(&self.driver), shutdown))
    }

    /// Open a connection for `service`, replacing any previous one.
    ///
    /// Secured selectors need a session registered first. On failure the
    /// context is left closed.
    pub async fn connect(
        &self,
        service: ServiceId,
        host: &str,
        port: u16,
        local_port: Option<u16>,
        protocol: ProtocolSelector,
    ) -> NetResult<()> {
        let mut table = self.table.lock().await;
        let ctx = table.get_mut(service);

        let session = if protocol.is_secured() {
            Some(ctx.live_session().ok_or(NetError::SessionNotRegistered(service))?)
        } else {
            None
        };

        if let Err(e) = self.close_context(ctx).await {
            tracing::warn!(%service, error = %e, "Closing previous connection reported an error");
        }

        tracing::info!(%service, host, port, %protocol, "Connecting");
        let target = Target { host, port, local_port, protocol };
        let link = match establish(&*self.driver, service, target, self.connect_timeout).await {
            Ok(link) => link,
            Err(e) => {
                metrics::record_connect(service, "failure");
                tracing::warn!(%service, host, error = %e, "Connect failed");
                return Err(e);
            }
        };

        if let Some(session) = session {
            let mut session = session.lock().await;
            if let Err(e) = self.start_secure(&mut *session, service, host, &link).await {
                drop(session);
                if let Err(close) = self.driver.close(link.descriptor) {
                    tracing::warn!(%service, descriptor = %link.descriptor, error = %close, "Close after failed handshake failed");
                }
                metrics::record_connect(service, "handshake_failure");
                return Err(e);
            }
        }

        ctx.open(link, Instant::now());
        let open = table.open_count();
        self.mux.attach(service, link.descriptor);
        metrics::record_connect(service, "success");
        tracing::info!(
            %service,
            descriptor = %link.descriptor,
            peer = %link.peer,
            variant = %link.variant,
            open,
            "Connected"
        );
        Ok(())
    }

    async fn start_secure(
        &self,
        session: &mut dyn SecureSession,
        service: ServiceId,
        host: &str,
        link: &Link,
    ) -> NetResult<()> {
        bind_socket(
            session,
            Arc::clone(&self.driver),
            link.descriptor,
            link.peer,
            link.variant.socket_kind(),
            self.datagram_mtu,
        );
        if link.variant == TransportVariant::Tls {
            session.set_hostname(host).map_err(NetError::SecureHandshakeFailure)?;
        }
        bridge::handshake(session).await.map_err(|e| {
            tracing::warn!(%service, error = %e, "Secure handshake failed");
            NetError::SecureHandshakeFailure(e)
        })?;
        tracing::debug!(%service, "Secure handshake complete");
        Ok(())
    }

    /// Write `buf` on the service's connection.
    pub async fn send(&self, service: ServiceId, buf: &[u8]) -> NetResult<usize> {
        let mut table = self.table.lock().await;
        let ctx = table.get_mut(service);
        let link = ctx.link.ok_or(NetError::Closed)?;

        let sent = if link.variant.is_secured() {
            let handle = ctx.live_session().ok_or(NetError::SessionNotRegistered(service))?;
            let mut session = handle.lock().await;
            bridge::secure_send(&mut *session, service, buf, ctx.last_send, &self.policy).await?
        } else {
            link.variant
                .plain_write(&*self.driver, link.descriptor, link.peer, buf)
                .map_err(|e| NetError::WriteFailure(e.into()))?
        };

        ctx.last_send = Some(Instant::now());
        Ok(sent)
    }

    /// Read whatever is available on the service's connection.
    ///
    /// Plain sockets report an empty queue as a would-block read failure;
    /// see [`NetError::is_would_block`].
    pub async fn receive(&self, service: ServiceId, buf: &mut [u8]) -> NetResult<usize> {
        let mut table = self.table.lock().await;
        let ctx = table.get_mut(service);
        let mut link = ctx.link.ok_or(NetError::Closed)?;

        let received = if link.variant.is_secured() {
            let handle = ctx.live_session().ok_or(NetError::SessionNotRegistered(service))?;
            let mut session = handle.lock().await;
            bridge::secure_receive(&mut *session, service, buf, link.variant.is_stream(), &self.policy).await?
        } else {
            let n = link
                .variant
                .plain_read(&*self.driver, link.descriptor, &mut link.peer, buf)
                .map_err(|e| NetError::ReadFailure(e.into()))?;
            ctx.link = Some(link);
            n
        };

        ctx.last_recv = Some(Instant::now());
        Ok(received)
    }

    /// Close the service's connection. Closing a closed context is a no-op.
    ///
    /// The context reads closed afterwards even when the graceful secure
    /// close or the socket close fails; the first failure is still reported.
    pub async fn close(&self, service: ServiceId) -> NetResult<()> {
        let mut table = self.table.lock().await;
        self.close_context(table.get_mut(service)).await
    }

    async fn close_context(&self, ctx: &mut NetworkContext) -> NetResult<()> {
        let service = ctx.service();
        let Some(link) = ctx.take_link() else {
            return Ok(());
        };
        self.mux.detach(service);

        let mut outcome = Ok(());
        if link.variant.is_secured() {
            if let Some(session) = ctx.live_session() {
                let mut session = session.lock().await;
                if let Err(e) = bridge::close_notify(&mut *session, self.policy.close_notify_attempts).await {
                    tracing::warn!(%service, error = %e, "Secure close failed");
                    outcome = Err(NetError::SecureCloseFailure(e));
                }
                if let Err(e) = session.session_reset() {
                    tracing::debug!(%service, error = %e, "Session reset after close failed");
                }
            }
        }

        if let Err(e) = self.driver.close(link.descriptor) {
            tracing::warn!(%service, descriptor = %link.descriptor, error = %e, "Socket close failed");
            if outcome.is_ok() {
                outcome = Err(NetError::CloseFailure(e));
            }
        }
        tracing::info!(%service, descriptor = %link.descriptor, "Closed");
        outcome
    }

    /// Attach a caller-owned session. The manager only keeps a weak handle.
    pub async fn register_ssl_context(&self, service: ServiceId, session: &SessionHandle) {
        self.table.lock().await.get_mut(service).register_session(session);
        tracing::debug!(%service, "Secure session registered");
    }

    /// Wire the registered session to the open socket.
    ///
    /// `connect` does this for secured selectors; calling it again rebinds.
    pub async fn bind_bio(&self, service: ServiceId) -> NetResult<()> {
        let table = self.table.lock().await;
        let ctx = table.get(service);
        let link = ctx.link.ok_or(NetError::Closed)?;
        let session = ctx.live_session().ok_or(NetError::SessionNotRegistered(service))?;
        let mut session = session.lock().await;
        bind_socket(
            &mut *session,
            Arc::clone(&self.driver),
            link.descriptor,
            link.peer,
            link.variant.socket_kind(),
            self.datagram_mtu,
        );
        Ok(())
    }

    /// Wait up to `timeout` for the service's socket to become readable.
    pub async fn wait_readable(&self, service: ServiceId, timeout: Duration) -> bool {
        self.mux.wait(service, Direction::Readable, timeout).await
    }

    /// Wait up to `timeout` for the service's socket to become writable.
    pub async fn wait_writable(&self, service: ServiceId, timeout: Duration) -> bool {
        self.mux.wait(service, Direction::Writable, timeout).await
    }

    /// Raw descriptor for `service`, −1 when closed.
    pub async fn socket(&self, service: ServiceId) -> i32 {
        self.table.lock().await.get(service).socket()
    }

    /// The registered session, if its owner still holds it.
    pub async fn session(&self, service: ServiceId) -> Option<SessionHandle> {
        self.table.lock().await.get(service).live_session()
    }

    pub async fn snapshot(&self, service: ServiceId) -> ContextSnapshot {
        let table = self.table.lock().await;
        ContextSnapshot::capture(
            table.get(service),
            self.mux.deadline(service, Direction::Readable),
            self.mux.deadline(service, Direction::Writable),
        )
    }
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("policy", &self.policy)
            .field("connect_timeout", &self.connect_timeout)
            .field("datagram_mtu", &self.datagram_mtu)
            .finish_non_exhaustive()
    }
}
