//! Request API behaviour against the simulated radio.

use netmux::net::ConnectionState;
use netmux::radio::INVALID_SOCKET;
use netmux::sim::RadioCall;
use netmux::{NetError, ProtocolSelector, ServiceId};

mod common;

#[tokio::test]
async fn test_time_sync_udp_connect_sequence() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    manager
        .connect(ServiceId::TimeSync, "peer.example", 123, None, ProtocolSelector::UDP_V4)
        .await
        .unwrap();

    assert_eq!(radio.count(|c| matches!(c, RadioCall::Socket(netmux::radio::SocketKind::Datagram))), 1);
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Bind(..))), 0);
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Connect(..))), 1);

    let snapshot = manager.snapshot(ServiceId::TimeSync).await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert!(snapshot.socket >= 0);
    assert!(snapshot.last_send.is_some());
    assert!(snapshot.last_recv.is_some());
    assert_eq!(snapshot.peer.map(|p| *p.ip()), Some(common::PEER_IP));
}

#[tokio::test]
async fn test_close_is_idempotent_for_every_service() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let protocols = [
        ProtocolSelector::UDP_V4,
        ProtocolSelector::DTLS_V4,
        ProtocolSelector::TCP_V4,
        ProtocolSelector::TLS_V4,
    ];

    let mut sessions = Vec::new();
    for (service, protocol) in ServiceId::ALL.into_iter().zip(protocols) {
        // A never-opened context closes cleanly too.
        manager.close(service).await.unwrap();

        if protocol.is_secured() {
            sessions.push(common::connect_secured(&manager, service, protocol).await);
        } else {
            common::connect_plain(&manager, service, protocol).await;
        }

        for _ in 0..3 {
            manager.close(service).await.unwrap();
            assert_eq!(manager.socket(service).await, INVALID_SOCKET);
            assert_eq!(manager.snapshot(service).await.state, ConnectionState::Closed);
        }
    }

    assert_eq!(radio.open_sockets(), 0);
    assert_eq!(radio.opened(), radio.closed());
}

#[tokio::test]
async fn test_reconnect_never_leaks_descriptor() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    for _ in 0..6 {
        common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
        let outstanding = radio.opened() - radio.closed();
        assert!(outstanding <= 1, "{outstanding} sockets outstanding");
        assert_eq!(radio.open_sockets(), 1);
    }

    manager.close(ServiceId::Messaging).await.unwrap();
    assert_eq!(radio.opened(), radio.closed());
}

#[tokio::test]
async fn test_reconnect_with_other_protocol_rebinds_variant() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::UDP_V4).await;

    manager.send(ServiceId::Messaging, b"ping").await.unwrap();
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Send(..))), 0);
    assert_eq!(radio.count(|c| matches!(c, RadioCall::SendTo(..))), 1);
}

#[tokio::test]
async fn test_services_hold_independent_sockets() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
    let time_sync = manager.socket(ServiceId::TimeSync).await;
    let messaging = manager.socket(ServiceId::Messaging).await;
    assert_ne!(time_sync, messaging);

    manager.close(ServiceId::TimeSync).await.unwrap();
    assert_eq!(manager.socket(ServiceId::Messaging).await, messaging);
    manager.send(ServiceId::Messaging, b"still up").await.unwrap();
}

#[tokio::test]
async fn test_stream_echo_round_trip() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;

    assert_eq!(manager.send(ServiceId::Messaging, b"publish").await.unwrap(), 7);
    let mut buf = [0u8; 4];
    let n = manager.receive(ServiceId::Messaging, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"publ");
    let n = manager.receive(ServiceId::Messaging, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"ish");
}

#[tokio::test]
async fn test_io_after_close_reports_closed() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    manager.close(ServiceId::TimeSync).await.unwrap();

    assert_eq!(manager.send(ServiceId::TimeSync, b"late").await, Err(NetError::Closed));
}

#[tokio::test]
async fn test_local_port_binds_once() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    manager
        .connect(ServiceId::TimeSync, "peer.example", 123, Some(1230), ProtocolSelector::UDP_V4)
        .await
        .unwrap();

    assert_eq!(radio.count(|c| matches!(c, RadioCall::Bind(..))), 1);
    let local = manager.snapshot(ServiceId::TimeSync).await.local;
    assert_eq!(local.map(|a| a.port()), Some(1230));
}
