//! Frame transports
//!
//! The relay core only needs an ordered, reliable stream of discrete frames
//! in each direction. A [`Transport`] splits into a [`FrameReader`] driven
//! by the connection's read loop and a [`FrameWriter`] owned by its writer
//! task.
//!
//! Two implementations ship with the crate:
//!
//! - [`WebSocketTransport`]: one WebSocket message per frame, which is what
//!   browsers speak.
//! - [`LengthDelimited`]: a 4-byte big-endian length prefix over any byte
//!   stream, for native clients and tests.

pub mod framed;
pub mod websocket;

use std::future::Future;

use bytes::Bytes;

use crate::connection::Liveness;
use crate::error::Result;

pub use framed::{FramedReader, FramedWriter, LengthDelimited};
pub use websocket::{WebSocketReader, WebSocketTransport, WebSocketWriter};

/// Inbound half of a transport
pub trait FrameReader: Send + 'static {
    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    fn read_frame(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Report transport-level signs of life (such as pongs) to `liveness`
    ///
    /// Frames returned by `read_frame` are counted by the caller, so a
    /// transport without control frames can keep the default.
    fn watch_liveness(&mut self, _liveness: Liveness) {}
}

/// Outbound half of a transport
pub trait FrameWriter: Send + 'static {
    /// Write one complete frame
    fn write_frame(&mut self, frame: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Flush and close the outbound direction
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether `ping` reaches the peer
    ///
    /// Heartbeats are skipped on transports that cannot ping.
    fn supports_ping(&self) -> bool {
        false
    }

    /// Send a keepalive the peer is expected to answer
    fn ping(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// A bidirectional frame transport
pub trait Transport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    /// Split into independently owned halves
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Transport selected for accepted connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// WebSocket upgrade, one binary message per frame
    WebSocket,
    /// Raw TCP with a 4-byte length prefix per frame
    LengthDelimited,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Ok(TransportKind::WebSocket),
            "tcp" | "framed" | "length-delimited" => Ok(TransportKind::LengthDelimited),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!("ws".parse::<TransportKind>(), Ok(TransportKind::WebSocket));
        assert_eq!("WebSocket".parse::<TransportKind>(), Ok(TransportKind::WebSocket));
        assert_eq!("tcp".parse::<TransportKind>(), Ok(TransportKind::LengthDelimited));
        assert!("quic".parse::<TransportKind>().is_err());
    }
}
