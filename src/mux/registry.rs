//! Outstanding readiness deadlines, one slot per service.

use std::time::Duration;

use tokio::time::Instant;

use crate::net::service::ServiceId;
use crate::radio::{Descriptor, Readiness};

/// Stand-in for deadlines the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Readable,
    Writable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WaitSlot {
    pub descriptor: Option<Descriptor>,
    pub rx_deadline: Option<Instant>,
    pub tx_deadline: Option<Instant>,
}

impl WaitSlot {
    fn deadline_mut(&mut self, direction: Direction) -> &mut Option<Instant> {
        match direction {
            Direction::Readable => &mut self.rx_deadline,
            Direction::Writable => &mut self.tx_deadline,
        }
    }
}

/// One readiness call worth of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPlan {
    pub read: Vec<Descriptor>,
    pub write: Vec<Descriptor>,
    /// Time until the earliest outstanding deadline.
    pub timeout: Duration,
}

/// Deadline table scanned by the mediator.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    slots: [WaitSlot; ServiceId::COUNT],
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the socket a service's waits refer to. Clears stale deadlines.
    pub fn attach(&mut self, service: ServiceId, descriptor: Descriptor) {
        self.slots[service.index()] = WaitSlot { descriptor: Some(descriptor), ..WaitSlot::default() };
    }

    /// Forget the service's socket and any deadline on it.
    pub fn detach(&mut self, service: ServiceId) {
        self.slots[service.index()] = WaitSlot::default();
    }

    /// Register a deadline. Returns false when the service has no open socket.
    pub fn register(&mut self, service: ServiceId, direction: Direction, deadline: Instant) -> bool {
        let slot = &mut self.slots[service.index()];
        if slot.descriptor.is_none() {
            return false;
        }
        *slot.deadline_mut(direction) = Some(deadline);
        true
    }

    pub fn deadline(&self, service: ServiceId, direction: Direction) -> Option<Instant> {
        let slot = &self.slots[service.index()];
        match direction {
            Direction::Readable => slot.rx_deadline,
            Direction::Writable => slot.tx_deadline,
        }
    }

    /// Drop expired deadlines and plan the next readiness call.
    ///
    /// Returns `None` when nothing is outstanding.
    pub fn plan(&mut self, now: Instant) -> Option<WaitPlan> {
        let mut plan = WaitPlan { read: Vec::new(), write: Vec::new(), timeout: Duration::MAX };

        for slot in self.slots.iter_mut() {
            let Some(sd) = slot.descriptor else { continue };
            for direction in [Direction::Readable, Direction::Writable] {
                let deadline = slot.deadline_mut(direction);
                let Some(at) = *deadline else { continue };
                if at < now {
                    *deadline = None;
                    continue;
                }
                plan.timeout = plan.timeout.min(at - now);
                match direction {
                    Direction::Readable => plan.read.push(sd),
                    Direction::Writable => plan.write.push(sd),
                }
            }
        }

        if plan.read.is_empty() && plan.write.is_empty() {
            None
        } else {
            Some(plan)
        }
    }

    /// Clear the deadlines satisfied by `ready` and report who to wake.
    pub fn dispatch(&mut self, ready: &Readiness) -> Vec<(ServiceId, Direction)> {
        let mut woken = Vec::new();
        for service in ServiceId::ALL {
            let slot = &mut self.slots[service.index()];
            let Some(sd) = slot.descriptor else { continue };
            if slot.rx_deadline.is_some() && ready.readable.contains(&sd) {
                slot.rx_deadline = None;
                woken.push((service, Direction::Readable));
            }
            if slot.tx_deadline.is_some() && ready.writable.contains(&sd) {
                slot.tx_deadline = None;
                woken.push((service, Direction::Writable));
            }
        }
        woken
    }
}
