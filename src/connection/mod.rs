//! Per-connection state and routing
//!
//! Each accepted connection gets a [`ConnectionMultiplexer`] that handles
//! its inbound frames and an [`OutboundQueue`] drained by a dedicated
//! writer task. On transports that support it the writer task also pings
//! the peer so dead links are noticed.

pub mod context;
pub mod heartbeat;
pub mod multiplexer;
pub mod outbound;
pub mod state;

pub use context::ConnectionContext;
pub use heartbeat::{Heartbeat, HeartbeatResult, Liveness};
pub use multiplexer::ConnectionMultiplexer;
pub use outbound::{write_loop, OutboundQueue, OutboundReceiver};
pub use state::{ConnectionPhase, ConnectionState};
