//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use tokio::sync::Mutex;

use netmux::config::NetmuxConfig;
use netmux::sim::{ScriptedSession, SimulatedRadio};
use netmux::{NetworkManager, ProtocolSelector, ServiceId, SessionHandle};

pub const PEER_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 50);

/// Ports the simulated peer echoes on.
pub const ECHO_PORTS: [u16; 4] = [123, 443, 1883, 5684];

/// Radio that resolves `peer.example` and echoes on [`ECHO_PORTS`].
pub fn radio() -> Arc<SimulatedRadio> {
    let radio = Arc::new(SimulatedRadio::new().with_host("peer.example", PEER_IP));
    for port in ECHO_PORTS {
        radio.add_echo_peer(SocketAddrV4::new(PEER_IP, port));
    }
    radio
}

/// Defaults with short multiplexer timings so wait tests finish quickly.
pub fn config() -> NetmuxConfig {
    let mut config = NetmuxConfig::default();
    config.mux.wait_grace_ms = 50;
    config.mux.select_slice_ms = 20;
    config
}

pub fn manager(radio: &Arc<SimulatedRadio>) -> NetworkManager {
    NetworkManager::new(radio.clone(), &config())
}

/// A scripted session plus the type-erased handle the manager takes.
pub fn session() -> (Arc<Mutex<ScriptedSession>>, SessionHandle) {
    let scripted = Arc::new(Mutex::new(ScriptedSession::new()));
    let handle: SessionHandle = scripted.clone();
    (scripted, handle)
}

pub fn port_for(protocol: ProtocolSelector) -> u16 {
    if protocol.is_secured() {
        if protocol == ProtocolSelector::TLS_V4 {
            443
        } else {
            5684
        }
    } else if protocol == ProtocolSelector::TCP_V4 {
        1883
    } else {
        123
    }
}

/// Register a fresh session and connect it. The caller keeps the session alive.
pub async fn connect_secured(
    manager: &NetworkManager,
    service: ServiceId,
    protocol: ProtocolSelector,
) -> (Arc<Mutex<ScriptedSession>>, SessionHandle) {
    let (scripted, handle) = session();
    manager.register_ssl_context(service, &handle).await;
    manager
        .connect(service, "peer.example", port_for(protocol), None, protocol)
        .await
        .expect("secured connect");
    {
        let mut session = scripted.lock().await;
        assert!(session.has_bio(), "connect wires the session to its socket");
        session.clear_calls();
    }
    (scripted, handle)
}

pub async fn connect_plain(manager: &NetworkManager, service: ServiceId, protocol: ProtocolSelector) {
    manager
        .connect(service, "peer.example", port_for(protocol), None, protocol)
        .await
        .expect("plain connect");
}
