//! Simulated radio driver.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::radio::{Descriptor, DriverError, RadioDriver, Readiness, SocketKind};

/// Socket slots the simulated chip offers.
const MAX_SOCKETS: u16 = 8;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Resolve(String),
    Socket(SocketKind),
    Bind(Descriptor, SocketAddrV4),
    SetNonBlocking(Descriptor),
    Connect(Descriptor, SocketAddrV4),
    Send(Descriptor, usize),
    SendTo(Descriptor, usize, SocketAddrV4),
    Recv(Descriptor),
    RecvFrom(Descriptor),
    Close(Descriptor),
    Select { read: Vec<Descriptor>, write: Vec<Descriptor> },
}

/// Driver steps that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailStep {
    Resolve,
    Socket,
    Bind,
    Connect,
    Send,
    Recv,
    Close,
    Select,
}

#[derive(Debug)]
struct SimSocket {
    kind: SocketKind,
    peer: Option<SocketAddrV4>,
    inbox: VecDeque<(Vec<u8>, SocketAddrV4)>,
}

#[derive(Debug, Default)]
struct RadioState {
    hosts: HashMap<String, Ipv4Addr>,
    sockets: BTreeMap<u16, SimSocket>,
    calls: Vec<RadioCall>,
    failing: HashSet<FailStep>,
    connect_in_progress: u32,
    pending_in_progress: u32,
    echo_peers: HashSet<SocketAddrV4>,
    outbox: Vec<(Descriptor, Vec<u8>)>,
    opened: u32,
    closed: u32,
}

impl RadioState {
    fn socket(&mut self, sd: Descriptor) -> Result<&mut SimSocket, DriverError> {
        u16::try_from(sd.raw())
            .ok()
            .and_then(|raw| self.sockets.get_mut(&raw))
            .ok_or(DriverError::BadDescriptor)
    }

    fn fail(&self, step: FailStep) -> Result<(), DriverError> {
        if self.failing.contains(&step) {
            Err(DriverError::Status(-1))
        } else {
            Ok(())
        }
    }

    fn transmit(&mut self, sd: Descriptor, buf: &[u8], to: SocketAddrV4) -> Result<usize, DriverError> {
        self.fail(FailStep::Send)?;
        let echo = self.echo_peers.contains(&to);
        let socket = self.socket(sd)?;
        if echo {
            socket.inbox.push_back((buf.to_vec(), to));
        }
        self.outbox.push((sd, buf.to_vec()));
        Ok(buf.len())
    }

    fn readiness(&self, read: &[Descriptor], write: &[Descriptor]) -> Result<Readiness, DriverError> {
        let mut ready = Readiness::default();
        for sd in read {
            let raw = u16::try_from(sd.raw()).map_err(|_| DriverError::BadDescriptor)?;
            let socket = self.sockets.get(&raw).ok_or(DriverError::BadDescriptor)?;
            if !socket.inbox.is_empty() {
                ready.readable.push(*sd);
            }
        }
        for sd in write {
            let raw = u16::try_from(sd.raw()).map_err(|_| DriverError::BadDescriptor)?;
            if !self.sockets.contains_key(&raw) {
                return Err(DriverError::BadDescriptor);
            }
            ready.writable.push(*sd);
        }
        Ok(ready)
    }
}

/// Radio driver backed by in-memory queues.
///
/// Hosts resolve through a static table, sends to an echo peer come back as
/// inbound data, and `select` blocks on a condition variable until data is
/// delivered or the timeout passes.
#[derive(Debug, Default)]
pub struct SimulatedRadio {
    state: Mutex<RadioState>,
    arrivals: Condvar,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: &str, addr: Ipv4Addr) -> Self {
        self.add_host(host, addr);
        self
    }

    fn state(&self) -> MutexGuard<'_, RadioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_host(&self, host: &str, addr: Ipv4Addr) {
        self.state().hosts.insert(host.to_string(), addr);
    }

    /// Datagrams and stream bytes sent to `peer` are queued back on the sender.
    pub fn add_echo_peer(&self, peer: SocketAddrV4) {
        self.state().echo_peers.insert(peer);
    }

    pub fn fail(&self, step: FailStep) {
        self.state().failing.insert(step);
    }

    pub fn recover(&self, step: FailStep) {
        self.state().failing.remove(&step);
    }

    /// Every connect sequence reports "in progress" this many times before completing.
    pub fn set_connect_in_progress(&self, rounds: u32) {
        let mut state = self.state();
        state.connect_in_progress = rounds;
        state.pending_in_progress = rounds;
    }

    /// Queue inbound data on an open socket and wake any pending `select`.
    pub fn deliver(&self, sd: Descriptor, data: &[u8], from: SocketAddrV4) {
        let mut state = self.state();
        if let Ok(socket) = state.socket(sd) {
            socket.inbox.push_back((data.to_vec(), from));
        }
        drop(state);
        self.arrivals.notify_all();
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&RadioCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Payloads written through `send`/`send_to`, in order.
    pub fn sent(&self) -> Vec<(Descriptor, Vec<u8>)> {
        self.state().outbox.clone()
    }

    pub fn opened(&self) -> u32 {
        self.state().opened
    }

    pub fn closed(&self) -> u32 {
        self.state().closed
    }

    pub fn open_sockets(&self) -> usize {
        self.state().sockets.len()
    }

    pub fn is_open(&self, sd: Descriptor) -> bool {
        self.state().socket(sd).is_ok()
    }
}

impl RadioDriver for SimulatedRadio {
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Resolve(host.to_string()));
        state.fail(FailStep::Resolve)?;
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(addr);
        }
        state.hosts.get(host).copied().ok_or(DriverError::HostNotFound)
    }

    fn socket(&self, kind: SocketKind) -> Result<Descriptor, DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Socket(kind));
        state.fail(FailStep::Socket)?;
        let raw = (0..MAX_SOCKETS)
            .find(|raw| !state.sockets.contains_key(raw))
            .ok_or(DriverError::Status(-10))?;
        state.sockets.insert(raw, SimSocket { kind, peer: None, inbox: VecDeque::new() });
        state.opened += 1;
        state.pending_in_progress = state.connect_in_progress;
        Ok(Descriptor::new(raw))
    }

    fn bind(&self, sd: Descriptor, local: SocketAddrV4) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Bind(sd, local));
        state.fail(FailStep::Bind)?;
        state.socket(sd).map(|_| ())
    }

    fn set_nonblocking(&self, sd: Descriptor) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::SetNonBlocking(sd));
        state.socket(sd).map(|_| ())
    }

    fn connect(&self, sd: Descriptor, peer: SocketAddrV4) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Connect(sd, peer));
        state.fail(FailStep::Connect)?;
        if state.pending_in_progress > 0 {
            state.pending_in_progress -= 1;
            return Err(DriverError::InProgress);
        }
        state.socket(sd)?.peer = Some(peer);
        Ok(())
    }

    fn send(&self, sd: Descriptor, buf: &[u8]) -> Result<usize, DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Send(sd, buf.len()));
        let peer = state.socket(sd)?.peer.ok_or(DriverError::Status(-57))?;
        let sent = state.transmit(sd, buf, peer);
        drop(state);
        self.arrivals.notify_all();
        sent
    }

    fn send_to(&self, sd: Descriptor, buf: &[u8], peer: SocketAddrV4) -> Result<usize, DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::SendTo(sd, buf.len(), peer));
        let sent = state.transmit(sd, buf, peer);
        drop(state);
        self.arrivals.notify_all();
        sent
    }

    fn recv(&self, sd: Descriptor, buf: &mut [u8]) -> Result<usize, DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Recv(sd));
        state.fail(FailStep::Recv)?;
        let socket = state.socket(sd)?;
        let Some((front, from)) = socket.inbox.pop_front() else {
            return Err(DriverError::WouldBlock);
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        if n < front.len() && socket.kind == SocketKind::Stream {
            socket.inbox.push_front((front[n..].to_vec(), from));
        }
        Ok(n)
    }

    fn recv_from(&self, sd: Descriptor, buf: &mut [u8]) -> Result<(usize, SocketAddrV4), DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::RecvFrom(sd));
        state.fail(FailStep::Recv)?;
        let socket = state.socket(sd)?;
        let Some((datagram, from)) = socket.inbox.pop_front() else {
            return Err(DriverError::WouldBlock);
        };
        // Datagram semantics: the unread tail is discarded.
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok((n, from))
    }

    fn close(&self, sd: Descriptor) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(RadioCall::Close(sd));
        state.fail(FailStep::Close)?;
        let raw = u16::try_from(sd.raw()).map_err(|_| DriverError::BadDescriptor)?;
        state.sockets.remove(&raw).ok_or(DriverError::BadDescriptor)?;
        state.closed += 1;
        Ok(())
    }

    fn select(
        &self,
        read: &[Descriptor],
        write: &[Descriptor],
        timeout: Duration,
    ) -> Result<Readiness, DriverError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        state.calls.push(RadioCall::Select { read: read.to_vec(), write: write.to_vec() });
        loop {
            state.fail(FailStep::Select)?;
            let ready = state.readiness(read, write)?;
            let now = Instant::now();
            if !ready.is_empty() || now >= deadline {
                return Ok(ready);
            }
            state = self
                .arrivals
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}
