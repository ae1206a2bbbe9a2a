//! netmux demo
//!
//! Drives every configured endpoint through the request API over the
//! simulated radio, with each peer echoing back what it receives.
//!
//! ```text
//!  caller task ──connect──▶ NetworkManager ──▶ SimulatedRadio ──▶ echo peer
//!       │                        │                                   │
//!       └──wait_readable──▶ ReadinessMux (mediator) ◀──── inbound ───┘
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;

use netmux::config::loader::load_config;
use netmux::config::EndpointConfig;
use netmux::observability::init_logging;
use netmux::sim::{ScriptedSession, SimulatedRadio};
use netmux::{NetmuxConfig, NetworkManager, ProtocolSelector, ServiceId, SessionHandle, Shutdown};

#[derive(Parser)]
#[command(name = "netmux")]
#[command(about = "Network session multiplexer demo over a simulated radio", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, exchange one message and close on every endpoint
    Run {
        #[arg(short, long, default_value = "hello")]
        message: String,

        /// Readiness wait per endpoint, in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        wait_ms: u64,
    },
    /// Validate the configuration and list endpoints
    Check,
    /// Decode a compact protocol selector
    Decode { bits: u8 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NetmuxConfig::default(),
    };
    init_logging(&config.observability)?;

    match cli.command {
        Commands::Run { message, wait_ms } => {
            run(config, message.as_bytes(), Duration::from_millis(wait_ms)).await?
        }
        Commands::Check => {
            for endpoint in endpoints(&config) {
                println!(
                    "{:<18} {}:{} {} (bits {:#07b})",
                    endpoint.service,
                    endpoint.host,
                    endpoint.port,
                    endpoint.protocol,
                    endpoint.selector()?.bits()
                );
            }
        }
        Commands::Decode { bits } => match ProtocolSelector::from_bits(bits) {
            Some(selector) => println!("{selector}"),
            None => eprintln!("{bits:#07b} is not a valid selector"),
        },
    }

    Ok(())
}

/// Configured endpoints, or a time-sync and a device-management pair.
fn endpoints(config: &NetmuxConfig) -> Vec<EndpointConfig> {
    if !config.endpoints.is_empty() {
        return config.endpoints.clone();
    }
    vec![
        EndpointConfig {
            service: ServiceId::TimeSync,
            host: "pool.example".into(),
            port: 123,
            protocol: "udp".into(),
            local_port: None,
        },
        EndpointConfig {
            service: ServiceId::DeviceManagement,
            host: "lwm2m.example".into(),
            port: 5684,
            protocol: "dtls".into(),
            local_port: Some(56830),
        },
    ]
}

async fn run(config: NetmuxConfig, message: &[u8], wait: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let endpoints = endpoints(&config);
    let radio = Arc::new(SimulatedRadio::new());
    for (i, endpoint) in endpoints.iter().enumerate() {
        let ip = endpoint
            .host
            .parse()
            .unwrap_or_else(|_| Ipv4Addr::new(192, 0, 2, 10 + i as u8));
        radio.add_host(&endpoint.host, ip);
        radio.add_echo_peer(SocketAddrV4::new(ip, endpoint.port));
    }

    let manager = NetworkManager::new(radio.clone(), &config);
    let shutdown = Shutdown::new();
    let mediator = manager.spawn_mediator(shutdown.subscribe());

    // Sessions are owned here; the manager only holds weak handles.
    let mut sessions: Vec<SessionHandle> = Vec::new();

    for endpoint in &endpoints {
        let protocol = endpoint.selector()?;
        let service = endpoint.service;
        if protocol.is_secured() {
            let session: SessionHandle = Arc::new(Mutex::new(ScriptedSession::new()));
            manager.register_ssl_context(service, &session).await;
            sessions.push(session);
        }

        if let Err(e) = exchange(&manager, endpoint, protocol, message, wait).await {
            tracing::error!(%service, error = %e, "Exchange failed");
        }
        if let Err(e) = manager.close(service).await {
            tracing::warn!(%service, error = %e, "Close reported an error");
        }
    }

    shutdown.trigger();
    mediator.await?;
    tracing::info!(opened = radio.opened(), closed = radio.closed(), "Demo complete");
    Ok(())
}

async fn exchange(
    manager: &NetworkManager,
    endpoint: &EndpointConfig,
    protocol: ProtocolSelector,
    message: &[u8],
    wait: Duration,
) -> netmux::NetResult<()> {
    let service = endpoint.service;
    manager
        .connect(service, &endpoint.host, endpoint.port, endpoint.bind_port(), protocol)
        .await?;
    manager.send(service, message).await?;

    if !manager.wait_readable(service, wait).await {
        tracing::warn!(%service, "No reply before timeout");
        return Ok(());
    }

    let mut buf = [0u8; 512];
    let n = manager.receive(service, &mut buf).await?;
    println!("{service}: {}", String::from_utf8_lossy(&buf[..n]));
    Ok(())
}
