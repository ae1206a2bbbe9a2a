//! Readiness multiplexer with the mediator task running.

use std::net::SocketAddrV4;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use netmux::sim::FailStep;
use netmux::{ProtocolSelector, ServiceId, Shutdown};

mod common;

const NO_HANG: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_waits_both_time_out() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let shutdown = Shutdown::new();
    let mediator = manager.spawn_mediator(shutdown.subscribe());

    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;

    let started = Instant::now();
    let (long, short) = timeout(
        NO_HANG,
        async {
            tokio::join!(
                manager.wait_readable(ServiceId::TimeSync, Duration::from_millis(500)),
                manager.wait_readable(ServiceId::Messaging, Duration::from_millis(200)),
            )
        },
    )
    .await
    .expect("waits must not hang");

    assert!(!long);
    assert!(!short);
    assert!(started.elapsed() >= Duration::from_millis(500));

    shutdown.trigger();
    timeout(NO_HANG, mediator).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inbound_data_wakes_reader() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let shutdown = Shutdown::new();
    let _mediator = manager.spawn_mediator(shutdown.subscribe());

    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;
    let sd = manager.snapshot(ServiceId::TimeSync).await.socket;
    let descriptor = netmux::radio::Descriptor::new(u16::try_from(sd).unwrap());

    let sender = radio.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.deliver(descriptor, b"time", SocketAddrV4::new(common::PEER_IP, 123));
    });

    let started = Instant::now();
    assert!(manager.wait_readable(ServiceId::TimeSync, Duration::from_secs(3)).await);
    assert!(started.elapsed() < Duration::from_secs(2));

    let mut buf = [0u8; 8];
    let n = manager.receive(ServiceId::TimeSync, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"time");
    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_reply_after_send() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let shutdown = Shutdown::new();
    let _mediator = manager.spawn_mediator(shutdown.subscribe());
    let (_scripted, _handle) =
        common::connect_secured(&manager, ServiceId::DeviceManagement, ProtocolSelector::DTLS_V4).await;

    manager.send(ServiceId::DeviceManagement, b"register").await.unwrap();
    assert!(manager.wait_readable(ServiceId::DeviceManagement, Duration::from_secs(2)).await);
    assert!(manager.wait_writable(ServiceId::DeviceManagement, Duration::from_secs(2)).await);

    let mut buf = [0u8; 16];
    let n = manager.receive(ServiceId::DeviceManagement, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"register");
    shutdown.trigger();
}

#[tokio::test]
async fn test_wait_on_closed_context_returns_immediately() {
    let radio = common::radio();
    let manager = common::manager(&radio);

    let started = Instant::now();
    assert!(!manager.wait_readable(ServiceId::WebTransfer, Duration::from_secs(30)).await);
    assert!(!manager.wait_writable(ServiceId::WebTransfer, Duration::from_secs(30)).await);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mediator_survives_readiness_failures() {
    let radio = common::radio();
    let manager = common::manager(&radio);
    let shutdown = Shutdown::new();
    let mediator = manager.spawn_mediator(shutdown.subscribe());
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;

    radio.fail(FailStep::Select);
    assert!(!manager.wait_readable(ServiceId::TimeSync, Duration::from_millis(100)).await);
    assert!(!mediator.is_finished());

    radio.recover(FailStep::Select);
    manager.send(ServiceId::TimeSync, b"echo").await.unwrap();
    assert!(manager.wait_readable(ServiceId::TimeSync, Duration::from_secs(2)).await);

    shutdown.trigger();
    timeout(NO_HANG, mediator).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_visible_in_snapshot_while_waiting() {
    let radio = common::radio();
    let manager = std::sync::Arc::new(common::manager(&radio));
    let shutdown = Shutdown::new();
    let _mediator = manager.spawn_mediator(shutdown.subscribe());
    common::connect_plain(&manager, ServiceId::Messaging, ProtocolSelector::TCP_V4).await;

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_readable(ServiceId::Messaging, Duration::from_millis(400)).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = manager.snapshot(ServiceId::Messaging).await;
    assert!(snapshot.rx_deadline.is_some());
    assert!(snapshot.tx_deadline.is_none());

    assert!(!waiter.await.unwrap());
    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unbounded_wait_timeout_is_accepted() {
    let radio = common::radio();
    let manager = std::sync::Arc::new(common::manager(&radio));
    let shutdown = Shutdown::new();
    let _mediator = manager.spawn_mediator(shutdown.subscribe());
    common::connect_plain(&manager, ServiceId::TimeSync, ProtocolSelector::UDP_V4).await;

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager.wait_readable(ServiceId::TimeSync, Duration::from_secs(u64::MAX)).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.send(ServiceId::TimeSync, b"tick").await.unwrap();

    let ready = timeout(NO_HANG, waiter).await.expect("wait must not hang");
    assert!(ready.expect("wait task must not panic"));
    shutdown.trigger();
}
