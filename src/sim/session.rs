//! Scripted secure session.

use std::collections::{HashMap, VecDeque};

use crate::secure::{Bio, EngineError, SecureSession};

/// Engine operations whose results can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    Handshake,
    Read,
    Write,
    CloseNotify,
    SessionReset,
    Renegotiate,
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetBio,
    SetMtu(u16),
    SetHostname(String),
    Handshake,
    Read,
    Write(usize),
    CloseNotify,
    SessionReset,
    Renegotiate,
}

/// Session that replays scripted results and records every call.
///
/// Unscripted lifecycle calls succeed. Unscripted reads and writes pass
/// plaintext straight through the bound bio, so the session also works as a
/// null cipher over a real socket.
#[derive(Default)]
pub struct ScriptedSession {
    calls: Vec<EngineCall>,
    scripts: HashMap<EngineOp, VecDeque<Result<usize, EngineError>>>,
    bio: Option<Box<dyn Bio>>,
    connection_id: bool,
    mtu: Option<u16>,
    hostname: Option<String>,
}

impl std::fmt::Debug for ScriptedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSession")
            .field("calls", &self.calls)
            .field("bio_bound", &self.bio.is_some())
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for `op`; they are consumed one per call.
    pub fn script(&mut self, op: EngineOp, results: Vec<Result<usize, EngineError>>) {
        self.scripts.entry(op).or_default().extend(results);
    }

    pub fn set_connection_id(&mut self, active: bool) {
        self.connection_id = active;
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn has_bio(&self) -> bool {
        self.bio.is_some()
    }

    pub fn mtu(&self) -> Option<u16> {
        self.mtu
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    fn next(&mut self, op: EngineOp) -> Option<Result<usize, EngineError>> {
        self.scripts.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn lifecycle(&mut self, op: EngineOp, call: EngineCall) -> Result<(), EngineError> {
        self.calls.push(call);
        match self.next(op) {
            Some(result) => result.map(|_| ()),
            None => Ok(()),
        }
    }
}

impl SecureSession for ScriptedSession {
    fn set_bio(&mut self, bio: Box<dyn Bio>) {
        self.calls.push(EngineCall::SetBio);
        self.bio = Some(bio);
    }

    fn set_mtu(&mut self, mtu: u16) {
        self.calls.push(EngineCall::SetMtu(mtu));
        self.mtu = Some(mtu);
    }

    fn set_hostname(&mut self, host: &str) -> Result<(), EngineError> {
        self.calls.push(EngineCall::SetHostname(host.to_string()));
        self.hostname = Some(host.to_string());
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        self.lifecycle(EngineOp::Handshake, EngineCall::Handshake)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        self.calls.push(EngineCall::Read);
        if let Some(result) = self.next(EngineOp::Read) {
            return result.map(|n| n.min(buf.len()));
        }
        match self.bio.as_mut() {
            Some(bio) => bio.recv(buf),
            None => Err(EngineError::WantRead),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        self.calls.push(EngineCall::Write(buf.len()));
        if let Some(result) = self.next(EngineOp::Write) {
            return result.map(|n| n.min(buf.len()));
        }
        match self.bio.as_mut() {
            Some(bio) => bio.send(buf),
            None => Ok(buf.len()),
        }
    }

    fn close_notify(&mut self) -> Result<(), EngineError> {
        self.lifecycle(EngineOp::CloseNotify, EngineCall::CloseNotify)
    }

    fn session_reset(&mut self) -> Result<(), EngineError> {
        self.lifecycle(EngineOp::SessionReset, EngineCall::SessionReset)
    }

    fn renegotiate(&mut self) -> Result<(), EngineError> {
        self.lifecycle(EngineOp::Renegotiate, EngineCall::Renegotiate)
    }

    fn connection_id_active(&self) -> bool {
        self.connection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_results_are_consumed_in_order() {
        let mut session = ScriptedSession::new();
        session.script(EngineOp::Handshake, vec![Err(EngineError::WantRead), Ok(0)]);
        assert_eq!(session.handshake(), Err(EngineError::WantRead));
        assert_eq!(session.handshake(), Ok(()));
        assert_eq!(session.handshake(), Ok(()));
        assert_eq!(session.count(|c| *c == EngineCall::Handshake), 3);
    }

    #[test]
    fn unbound_read_wants_read() {
        let mut session = ScriptedSession::new();
        let mut buf = [0u8; 4];
        assert_eq!(session.read(&mut buf), Err(EngineError::WantRead));
    }
}
