//! Signaling relay server
//!
//! Run with: cargo run --example relay_server -- [BIND_ADDR] [--tcp]
//!
//! Examples:
//!   cargo run --example relay_server                    # ws on 0.0.0.0:9001
//!   cargo run --example relay_server localhost          # ws on 127.0.0.1:9001
//!   cargo run --example relay_server 127.0.0.1:9100     # ws on 127.0.0.1:9100
//!   cargo run --example relay_server -- --tcp           # length-prefixed TCP
//!
//! Pair it with the chat_peer demo, or point two browser tabs at it and
//! exchange RTCPeerConnection offers through a shared session name.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use signal_relay::connection::ConnectionContext;
use signal_relay::protocol::constants::DEFAULT_PORT;
use signal_relay::transport::TransportKind;
use signal_relay::{RegistryConfig, RelayHandler, RelayServer, ServerConfig, SessionName};

/// Prints lifecycle events and keeps live counts
#[derive(Default)]
struct LoggingHandler {
    connections: AtomicUsize,
    sessions: AtomicUsize,
}

impl RelayHandler for LoggingHandler {
    async fn on_connection(&self, ctx: &ConnectionContext) {
        let live = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "[{}] Connected from {} ({} live)",
            ctx.connection_id, ctx.peer_addr, live
        );
    }

    async fn on_session_created(&self, ctx: &ConnectionContext, session: &SessionName) {
        let live = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "[{}] Opened session '{}' ({} live)",
            ctx.connection_id, session, live
        );
    }

    async fn on_session_closed(&self, session: &SessionName) {
        let live = self.sessions.fetch_sub(1, Ordering::Relaxed) - 1;
        println!("Session '{}' closed ({} live)", session, live);
    }

    async fn on_disconnect(&self, ctx: &ConnectionContext) {
        let live = self.connections.fetch_sub(1, Ordering::Relaxed) - 1;
        println!("[{}] Disconnected ({} live)", ctx.connection_id, live);
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:9001
/// - "localhost:9100" -> 127.0.0.1:9100
/// - "127.0.0.1" -> 127.0.0.1:9001
/// - "0.0.0.0:9001" -> 0.0.0.0:9001
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR] [--tcp]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!("  --tcp        Length-prefixed TCP frames instead of WebSocket");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let transport = if args.iter().any(|a| a == "--tcp") {
        TransportKind::LengthDelimited
    } else {
        TransportKind::WebSocket
    };

    let mut config = ServerConfig::default().transport(transport);
    if let Some(addr_str) = args.iter().find(|a| !a.starts_with("--")) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let transport = config.transport;
    let server = RelayServer::with_registry_config(
        config,
        LoggingHandler::default(),
        RegistryConfig::default().announce_sessions(),
    );
    println!(
        "Starting signaling relay on {} ({:?})",
        server.bind_addr(),
        transport
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let handler = server.handler();
    println!(
        "Stopped with {} connections and {} sessions still live",
        handler.connections.load(Ordering::Relaxed),
        handler.sessions.load(Ordering::Relaxed)
    );

    Ok(())
}
