//! Signaling client
//!
//! Thin client for talking to a relay: send typed messages, receive typed
//! messages. Used by the demos and the integration tests, and usable from
//! native peers that do their own WebRTC.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_tungstenite::MaybeTlsStream;

use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_MAX_FRAME_SIZE;
use crate::protocol::{decode, encode, SignalMessage};
use crate::transport::websocket::websocket_config;
use crate::transport::{FrameReader, FrameWriter, LengthDelimited, Transport, WebSocketTransport};

/// Client connection to a signaling relay
///
/// # Example
/// ```no_run
/// use signal_relay::client::SignalingClient;
/// use signal_relay::protocol::SignalMessage;
///
/// # async fn example() -> signal_relay::error::Result<()> {
/// let mut client = SignalingClient::connect_ws("ws://127.0.0.1:9001").await?;
/// let peer_id = client.join("room1").await?;
/// println!("joined as {}", peer_id);
///
/// client.send(&SignalMessage::offer("room1", "v=0...")).await?;
/// while let Some(message) = client.recv().await? {
///     println!("{:?}", message);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SignalingClient<T: Transport> {
    reader: T::Reader,
    writer: T::Writer,
    /// Messages that arrived while waiting for a join acknowledgement
    pending: VecDeque<SignalMessage>,
}

impl SignalingClient<WebSocketTransport<MaybeTlsStream<TcpStream>>> {
    /// Connect over WebSocket (`ws://` or `wss://` URL)
    pub async fn connect_ws(url: &str) -> Result<Self> {
        Self::connect_ws_with_max_frame_size(url, DEFAULT_MAX_FRAME_SIZE).await
    }

    /// Connect over WebSocket, refusing inbound messages over `max_frame_size`
    pub async fn connect_ws_with_max_frame_size(url: &str, max_frame_size: usize) -> Result<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async_with_config(
            url,
            Some(websocket_config(max_frame_size)),
            true,
        )
        .await?;
        tracing::debug!(url = url, max_frame_size, "Connected to relay");
        Ok(Self::new(WebSocketTransport::with_max_frame_size(
            stream,
            max_frame_size,
        )))
    }
}

impl SignalingClient<LengthDelimited<TcpStream>> {
    /// Connect over raw TCP with length-prefixed frames
    pub async fn connect_tcp<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(addr = ?stream.peer_addr().ok(), "Connected to relay");
        Ok(Self::new(LengthDelimited::new(stream)))
    }
}

impl<T: Transport> SignalingClient<T> {
    /// Wrap an established transport
    pub fn new(transport: T) -> Self {
        let (reader, writer) = transport.split();
        Self {
            reader,
            writer,
            pending: VecDeque::new(),
        }
    }

    /// Send a message
    pub async fn send(&mut self, message: &SignalMessage) -> Result<()> {
        self.writer.write_frame(encode(message)).await
    }

    /// Send an arbitrary frame, bypassing the encoder
    pub async fn send_raw(&mut self, frame: Bytes) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    /// Receive the next message
    ///
    /// Returns `Ok(None)` once the relay closed the connection.
    pub async fn recv(&mut self) -> Result<Option<SignalMessage>> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        match self.reader.read_frame().await? {
            Some(frame) => Ok(Some(decode(frame)?)),
            None => Ok(None),
        }
    }

    /// Join a session and wait for the acknowledgement
    ///
    /// Returns the peer id the relay assigned to this connection. Anything
    /// else received in the meantime is kept for later [`recv`] calls.
    ///
    /// The relay answers a refused join with an `Error` message that is not
    /// tied to a request, so the first `Error` that arrives before the
    /// acknowledgement is reported as [`Error::Rejected`]. Wait for earlier
    /// sends to settle before joining if their errors must not be mistaken
    /// for a refused join.
    ///
    /// [`recv`]: SignalingClient::recv
    pub async fn join(&mut self, session: &str) -> Result<String> {
        self.send(&SignalMessage::join(session)).await?;

        let mut held = VecDeque::new();
        let result = loop {
            let frame = match self.reader.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Err(Error::ConnectionClosed),
                Err(e) => break Err(e),
            };

            match decode(frame) {
                Ok(SignalMessage::Joined {
                    session: joined,
                    peer_id,
                }) if joined == session => break Ok(peer_id),
                Ok(SignalMessage::Error { reason }) => break Err(Error::Rejected(reason)),
                Ok(other) => held.push_back(other),
                Err(e) => break Err(e.into()),
            }
        };

        self.pending.extend(held);
        result
    }

    /// Leave a session
    pub async fn leave(&mut self, session: &str) -> Result<()> {
        self.send(&SignalMessage::leave(session)).await
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.close().await
    }
}
