//! Driver and engine failure injection.

use netmux::config::loader::parse_config;
use netmux::error::IoFault;
use netmux::radio::{DriverError, INVALID_SOCKET};
use netmux::secure::EngineError;
use netmux::sim::{EngineOp, FailStep, RadioCall};
use netmux::{NetError, NetworkManager, ProtocolSelector, ServiceId};

mod common;

async fn assert_closed(manager: &NetworkManager, radio: &netmux::sim::SimulatedRadio, service: ServiceId) {
    assert_eq!(manager.socket(service).await, INVALID_SOCKET);
    assert_eq!(radio.open_sockets(), 0);
    assert_eq!(radio.opened(), radio.closed());
}

#[tokio::test]
async fn test_dns_failure_opens_nothing() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    let err = manager
        .connect(ServiceId::TimeSync, "unknown.example", 123, None, ProtocolSelector::UDP_V4)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        NetError::DnsFailure { host: "unknown.example".into(), source: DriverError::HostNotFound }
    );
    assert_eq!(radio.opened(), 0);
    assert_closed(&manager, &radio, ServiceId::TimeSync).await;
}

#[tokio::test]
async fn test_socket_failure() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    radio.fail(FailStep::Socket);

    let err = manager
        .connect(ServiceId::TimeSync, "peer.example", 123, None, ProtocolSelector::UDP_V4)
        .await
        .unwrap_err();
    assert_eq!(err, NetError::SocketCreateFailure(DriverError::Status(-1)));
    assert_closed(&manager, &radio, ServiceId::TimeSync).await;
}

#[tokio::test]
async fn test_bind_failure_closes_socket() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    radio.fail(FailStep::Bind);

    let err = manager
        .connect(ServiceId::TimeSync, "peer.example", 123, Some(1230), ProtocolSelector::UDP_V4)
        .await
        .unwrap_err();
    assert_eq!(err, NetError::BindFailure { port: 1230, source: DriverError::Status(-1) });
    assert_eq!(radio.opened(), 1);
    assert_closed(&manager, &radio, ServiceId::TimeSync).await;
}

#[tokio::test]
async fn test_connect_failure_is_retryable() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    radio.fail(FailStep::Connect);

    let err = manager
        .connect(ServiceId::Messaging, "peer.example", 1883, None, ProtocolSelector::TCP_V4)
        .await
        .unwrap_err();
    assert_eq!(err, NetError::ConnectFailure(DriverError::Status(-1)));
    assert_closed(&manager, &radio, ServiceId::Messaging).await;

    radio.recover(FailStep::Connect);
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
    assert!(manager.socket(ServiceId::Messaging).await >= 0);
}

#[tokio::test]
async fn test_connect_retries_while_in_progress() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    radio.set_connect_in_progress(4);

    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Connect(..))), 5);
}

#[tokio::test]
async fn test_connect_in_progress_is_bounded() {
    let radio = common::radio();
    let mut config = common::config();
    config.network.connect_timeout_secs = 0;
    let manager = NetworkManager::new(radio.clone(), &config);
    radio.set_connect_in_progress(2);

    let err = manager
        .connect(ServiceId::Messaging, "peer.example", 1883, None, ProtocolSelector::TCP_V4)
        .await
        .unwrap_err();
    assert_eq!(err, NetError::ConnectFailure(DriverError::InProgress));
    assert_closed(&manager, &radio, ServiceId::Messaging).await;
}

#[tokio::test]
async fn test_huge_connect_timeout_still_connects() {
    let radio = common::radio();
    let config = parse_config("[network]\nconnect_timeout_secs = 9223372036854775807\n").unwrap();
    let manager = NetworkManager::new(radio.clone(), &config);
    radio.set_connect_in_progress(2);

    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Connect(..))), 3);
}

#[tokio::test]
async fn test_handshake_failure_closes_socket() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let (scripted, handle) = common::session();
    scripted
        .lock()
        .await
        .script(EngineOp::Handshake, vec![Err(EngineError::WantRead), Err(EngineError::Fatal(-0x7200))]);
    manager.register_ssl_context(ServiceId::DeviceManagement, &handle).await;

    let err = manager
        .connect(ServiceId::DeviceManagement, "peer.example", 5684, None, ProtocolSelector::DTLS_V4)
        .await
        .unwrap_err();
    assert_eq!(err, NetError::SecureHandshakeFailure(EngineError::Fatal(-0x7200)));
    assert_closed(&manager, &radio, ServiceId::DeviceManagement).await;
}

#[tokio::test]
async fn test_failed_close_notify_still_releases_socket() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let (scripted, _handle) =
        common::connect_secured(&manager, ServiceId::DeviceManagement, ProtocolSelector::DTLS_V4).await;
    scripted
        .lock()
        .await
        .script(EngineOp::CloseNotify, vec![Err(EngineError::Transport(DriverError::Status(-3)))]);

    let err = manager.close(ServiceId::DeviceManagement).await.unwrap_err();
    assert_eq!(err, NetError::SecureCloseFailure(EngineError::Transport(DriverError::Status(-3))));
    assert_closed(&manager, &radio, ServiceId::DeviceManagement).await;

    // Already closed now.
    manager.close(ServiceId::DeviceManagement).await.unwrap();
}

#[tokio::test]
async fn test_failed_reconnect_releases_previous_socket() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;

    radio.fail(FailStep::Connect);
    assert!(manager
        .connect(ServiceId::TimeSync, "peer.example", 123, None, ProtocolSelector::UDP_V4)
        .await
        .is_err());
    assert_closed(&manager, &radio, ServiceId::TimeSync).await;
}

#[tokio::test]
async fn test_plain_send_failure_is_reported() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    radio.fail(FailStep::Send);

    let err = manager.send(ServiceId::TimeSync, b"lost").await.unwrap_err();
    assert_eq!(err, NetError::WriteFailure(IoFault::Driver(DriverError::Status(-1))));
    assert!(!err.is_would_block());
}

#[tokio::test]
async fn test_socket_close_failure_is_reported() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    radio.fail(FailStep::Close);

    let err = manager.close(ServiceId::TimeSync).await.unwrap_err();
    assert_eq!(err, NetError::CloseFailure(DriverError::Status(-1)));
    assert_eq!(manager.socket(ServiceId::TimeSync).await, INVALID_SOCKET);

    // Nothing left to close, so the failing driver is not consulted again.
    manager.close(ServiceId::TimeSync).await.unwrap();
    assert_eq!(radio.count(|c| matches!(c, RadioCall::Close(_))), 1);
}

#[tokio::test]
async fn test_close_notify_failure_takes_precedence_over_close_failure() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let (scripted, _handle) =
        common::connect_secured(&manager, ServiceId::DeviceManagement, ProtocolSelector::DTLS_V4).await;
    scripted
        .lock()
        .await
        .script(EngineOp::CloseNotify, vec![Err(EngineError::Fatal(-4))]);
    radio.fail(FailStep::Close);

    let err = manager.close(ServiceId::DeviceManagement).await.unwrap_err();
    assert_eq!(err, NetError::SecureCloseFailure(EngineError::Fatal(-4)));
    assert_eq!(manager.socket(ServiceId::DeviceManagement).await, INVALID_SOCKET);
}
