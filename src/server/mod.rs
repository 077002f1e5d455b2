//! Signaling relay server
//!
//! Accepts TCP connections, performs the transport handshake and hands each
//! connection to its own task. Session logic lives in the registry and the
//! connection multiplexer; the server only wires them together.

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use handler::{NoopHandler, RelayHandler};
pub use listener::RelayServer;
