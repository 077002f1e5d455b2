//! signal-relay: WebRTC signaling relay
//!
//! Browsers that want a peer-to-peer WebRTC connection first have to swap
//! session descriptions and ICE candidates through a third party. This
//! crate is that third party: clients join named sessions over a WebSocket
//! (or length-prefixed TCP) connection, and every offer, answer and
//! candidate a member sends is forwarded verbatim to the other members.
//! The relay never looks inside SDP or candidate payloads.
//!
//! # Example
//!
//! ```no_run
//! use signal_relay::server::{NoopHandler, RelayServer, ServerConfig};
//!
//! # async fn example() -> signal_relay::error::Result<()> {
//! let config = ServerConfig::default();
//! let server = RelayServer::new(config, NoopHandler);
//! server.run().await
//! # }
//! ```
//!
//! # Layout
//!
//! - [`protocol`]: message types and the binary codec
//! - [`registry`]: sessions, membership and message routing
//! - [`connection`]: per-connection multiplexer, outbound queue and heartbeat
//! - [`transport`]: WebSocket and length-delimited framing
//! - [`server`]: accept loop and connection tasks
//! - [`client`]: client for native peers and tests

pub mod client;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use client::SignalingClient;
pub use error::{Error, Result};
pub use protocol::{ConnectionId, SessionName, SignalMessage};
pub use registry::{RegistryConfig, SessionRegistry};
pub use server::{NoopHandler, RelayHandler, RelayServer, ServerConfig};
