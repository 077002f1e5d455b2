//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::constants::*;
use crate::transport::TransportKind;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Transport spoken on accepted sockets
    pub transport: TransportKind,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Disconnect if no frame arrives for this long (None = never)
    pub idle_timeout: Option<Duration>,

    /// Ping the peer this often (None = no heartbeat)
    ///
    /// Only transports that can ping (WebSocket) are pinged.
    pub heartbeat_interval: Option<Duration>,

    /// Disconnect after this long without a frame or pong from the peer
    pub heartbeat_timeout: Duration,

    /// How long the writer gets to flush queued messages on close
    pub close_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Largest inbound frame accepted
    pub max_frame_size: usize,

    /// Pending outbound messages per connection before it counts as lagging
    pub outbound_queue_capacity: usize,

    /// Sessions one connection may belong to at once (0 = unlimited)
    pub max_sessions_per_connection: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            transport: TransportKind::WebSocket,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            heartbeat_interval: Some(Duration::from_secs(30)),
            heartbeat_timeout: Duration::from_secs(90),
            close_timeout: Duration::from_secs(5),
            tcp_nodelay: true, // Signaling is small and latency-bound
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_sessions_per_connection: 0,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set heartbeat interval and timeout
    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self.heartbeat_timeout = timeout;
        self
    }

    /// Turn the heartbeat off
    pub fn disable_heartbeat(mut self) -> Self {
        self.heartbeat_interval = None;
        self
    }

    /// Set close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set maximum inbound frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set outbound queue capacity
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Set per-connection session limit
    pub fn max_sessions_per_connection(mut self, max: usize) -> Self {
        self.max_sessions_per_connection = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9002);
    }

    #[test]
    fn test_builder_outbound_capacity_floor() {
        let config = ServerConfig::default().outbound_queue_capacity(0);

        assert_eq!(config.outbound_queue_capacity, 1);
    }

    #[test]
    fn test_heartbeat_builders() {
        let config =
            ServerConfig::default().heartbeat(Duration::from_secs(5), Duration::from_secs(15));
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(15));

        let config = config.disable_heartbeat();
        assert_eq!(config.heartbeat_interval, None);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .transport(TransportKind::LengthDelimited)
            .handshake_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(30))
            .close_timeout(Duration::from_secs(1))
            .max_frame_size(4096)
            .max_sessions_per_connection(8);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.transport, TransportKind::LengthDelimited);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.close_timeout, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.max_sessions_per_connection, 8);
    }
}
