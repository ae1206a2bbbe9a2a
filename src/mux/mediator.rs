//! Mediator task and the caller-facing wait API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;

use crate::config::MuxConfig;
use crate::mux::registry::{deadline_after, Direction, WaitPlan, WaitRegistry};
use crate::mux::signal::BinarySignal;
use crate::net::service::ServiceId;
use crate::observability::metrics;
use crate::radio::{Descriptor, RadioDriver, Readiness};

#[derive(Debug, Default)]
struct ServiceSignals {
    rx: BinarySignal,
    tx: BinarySignal,
}

/// Shared state between waiting callers and the mediator task.
#[derive(Debug)]
pub struct ReadinessMux {
    registry: Mutex<WaitRegistry>,
    signals: [ServiceSignals; ServiceId::COUNT],
    wake: Notify,
    grace: Duration,
    select_slice: Duration,
}

impl ReadinessMux {
    pub fn new(config: &MuxConfig) -> Self {
        Self {
            registry: Mutex::new(WaitRegistry::new()),
            signals: std::array::from_fn(|_| ServiceSignals::default()),
            wake: Notify::new(),
            grace: config.wait_grace(),
            select_slice: config.select_slice(),
        }
    }

    fn registry(&self) -> MutexGuard<'_, WaitRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, service: ServiceId, direction: Direction) -> &BinarySignal {
        let signals = &self.signals[service.index()];
        match direction {
            Direction::Readable => &signals.rx,
            Direction::Writable => &signals.tx,
        }
    }

    pub(crate) fn attach(&self, service: ServiceId, descriptor: Descriptor) {
        self.registry().attach(service, descriptor);
    }

    pub(crate) fn detach(&self, service: ServiceId) {
        self.registry().detach(service);
    }

    pub fn deadline(&self, service: ServiceId, direction: Direction) -> Option<Instant> {
        self.registry().deadline(service, direction)
    }

    /// Block the calling task until the service's socket is ready in
    /// `direction` or `timeout` passes. Returns whether readiness arrived.
    pub async fn wait(&self, service: ServiceId, direction: Direction, timeout: Duration) -> bool {
        let signal = self.signal(service, direction);
        signal.clear();

        let registered = self.registry().register(service, direction, deadline_after(Instant::now(), timeout));
        if !registered {
            tracing::debug!(%service, ?direction, "Wait on closed context");
            return false;
        }

        self.wake.notify_one();
        let ready = signal.take(timeout.saturating_add(self.grace)).await;
        tracing::trace!(%service, ?direction, ready, "Wait finished");
        ready
    }

    /// Mediator loop. Runs until `shutdown` fires.
    pub async fn run(self: Arc<Self>, driver: Arc<dyn RadioDriver>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(select_slice_ms = self.select_slice.as_millis() as u64, "Readiness mediator starting");

        loop {
            let plan = self.registry().plan(Instant::now());
            let Some(plan) = plan else {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = shutdown.recv() => break,
                }
                continue;
            };

            let ready = self.poll(&driver, plan).await;
            self.dispatch(&ready);

            if !matches!(shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
                break;
            }
        }

        tracing::info!("Readiness mediator stopped");
    }

    async fn poll(&self, driver: &Arc<dyn RadioDriver>, plan: WaitPlan) -> Readiness {
        let slice = plan.timeout.min(self.select_slice);
        let driver = Arc::clone(driver);
        let WaitPlan { read, write, .. } = plan;

        let result = tokio::task::spawn_blocking(move || driver.select(&read, &write, slice)).await;
        match result {
            Ok(Ok(ready)) => {
                metrics::record_mux_round(if ready.is_empty() { "idle" } else { "ready" });
                ready
            }
            Ok(Err(e)) => {
                metrics::record_mux_round("error");
                tracing::warn!(error = %e, "Readiness call failed, treating round as idle");
                tokio::time::sleep(slice).await;
                Readiness::default()
            }
            Err(e) => {
                metrics::record_mux_round("error");
                tracing::error!(error = %e, "Readiness call panicked, treating round as idle");
                Readiness::default()
            }
        }
    }

    fn dispatch(&self, ready: &Readiness) {
        if ready.is_empty() {
            return;
        }
        let woken = self.registry().dispatch(ready);
        for (service, direction) in woken {
            self.signal(service, direction).give();
        }
    }
}
