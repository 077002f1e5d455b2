//! Handler context
//!
//! Context passed to handler callbacks containing connection information.

use std::net::SocketAddr;

use crate::protocol::ConnectionId;
use crate::transport::TransportKind;

/// Context passed to RelayHandler callbacks
///
/// Read-only snapshot of who the connection is.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Unique connection ID
    pub connection_id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Transport the connection arrived on
    pub transport: TransportKind,
}

impl ConnectionContext {
    /// Create a new context
    pub fn new(connection_id: ConnectionId, peer_addr: SocketAddr, transport: TransportKind) -> Self {
        Self {
            connection_id,
            peer_addr,
            transport,
        }
    }
}
