//! WebSocket transport
//!
//! Each binary WebSocket message carries one frame. Text messages are
//! accepted too and handed to the codec as their UTF-8 bytes, so a client
//! that sends text gets a decode error back instead of a dropped
//! connection. Pings from the peer are answered by tungstenite while
//! reading; pongs to our own pings feed the connection's [`Liveness`].
//!
//! Message and frame size limits are handed to tungstenite, so an oversized
//! message is refused while it arrives instead of after it was buffered.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::{FrameReader, FrameWriter, Transport};
use crate::connection::Liveness;
use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_MAX_FRAME_SIZE;

/// A WebSocket connection carrying signaling frames
#[derive(Debug)]
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
    max_frame_size: usize,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established WebSocket stream
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self::with_max_frame_size(stream, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(stream: WebSocketStream<S>, max_frame_size: usize) -> Self {
        Self {
            stream,
            max_frame_size,
        }
    }

    /// Perform the server side of the upgrade handshake
    pub async fn accept(socket: S, max_frame_size: usize) -> Result<Self> {
        let config = websocket_config(max_frame_size);
        let stream = tokio_tungstenite::accept_async_with_config(socket, Some(config)).await?;
        Ok(Self::with_max_frame_size(stream, max_frame_size))
    }
}

/// tungstenite limits for a transport carrying frames up to `max_frame_size`
///
/// One signaling frame is one unfragmented message, so both the message and
/// the frame limit are the signaling frame limit.
pub fn websocket_config(max_frame_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_frame_size);
    config.max_frame_size = Some(max_frame_size);
    config
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WebSocketReader<S>;
    type Writer = WebSocketWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.stream.split();
        (
            WebSocketReader {
                stream,
                max_frame_size: self.max_frame_size,
                liveness: None,
            },
            WebSocketWriter { sink },
        )
    }
}

/// Inbound half of a WebSocket transport
#[derive(Debug)]
pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    max_frame_size: usize,
    liveness: Option<Liveness>,
}

impl<S> WebSocketReader<S> {
    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl<S> FrameReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            };

            if let Some(ref liveness) = self.liveness {
                liveness.mark_alive();
            }

            match message {
                Message::Binary(data) => {
                    self.check_size(data.len())?;
                    return Ok(Some(data));
                }
                Message::Text(text) => {
                    self.check_size(text.len())?;
                    return Ok(Some(Bytes::copy_from_slice(text.as_bytes())));
                }
                Message::Close(frame) => {
                    tracing::trace!(close_frame = ?frame, "WebSocket close received");
                    return Ok(None);
                }
                // Control frames carry no signaling data
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn watch_liveness(&mut self, liveness: Liveness) {
        self.liveness = Some(liveness);
    }
}

/// Outbound half of a WebSocket transport
#[derive(Debug)]
pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> FrameWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Bytes) -> Result<()> {
        self.sink.send(Message::Binary(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }

    fn supports_ping(&self) -> bool {
        true
    }

    async fn ping(&mut self) -> Result<()> {
        self.sink.send(Message::Ping(Bytes::new())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (
        WebSocketTransport<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let server =
            WebSocketStream::from_raw_socket(server, Role::Server, Some(websocket_config(16))).await;
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        (WebSocketTransport::with_max_frame_size(server, 16), client)
    }

    #[tokio::test]
    async fn test_binary_and_text_frames() {
        let (transport, mut client) = pair().await;
        let (mut reader, _writer) = transport.split();

        client
            .send(Message::Binary(Bytes::from_static(b"\x01bin")))
            .await
            .unwrap();
        client.send(Message::Ping(Bytes::new())).await.unwrap();
        client.send(Message::text(String::from("txt"))).await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"\x01bin"[..]);
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"txt"[..]);

        client.close(None).await.unwrap();
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let (transport, mut client) = pair().await;
        let (mut reader, _writer) = transport.split();

        client
            .send(Message::Binary(Bytes::from(vec![0u8; 17])))
            .await
            .unwrap();

        // Refused by tungstenite before the message is assembled
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(Error::FrameTooLarge { max: 16, .. })));
    }

    #[test]
    fn test_websocket_config_limits() {
        let config = websocket_config(256 * 1024);

        assert_eq!(config.max_message_size, Some(256 * 1024));
        assert_eq!(config.max_frame_size, Some(256 * 1024));
    }

    #[tokio::test]
    async fn test_ping_and_inbound_traffic_mark_alive() {
        let (transport, mut client) = pair().await;
        let (mut reader, mut writer) = transport.split();
        let liveness = Liveness::new();
        reader.watch_liveness(liveness.clone());
        assert!(liveness.take());

        assert!(writer.supports_ping());
        writer.ping().await.unwrap();

        // The client answers with a pong ahead of its next message
        match client.next().await {
            Some(Ok(Message::Ping(_))) => {}
            other => panic!("Expected ping, got {:?}", other),
        }
        client
            .send(Message::Binary(Bytes::from_static(b"x")))
            .await
            .unwrap();

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), &b"x"[..]);
        assert!(liveness.take());
    }

    #[tokio::test]
    async fn test_write_frame() {
        let (transport, mut client) = pair().await;
        let (_reader, mut writer) = transport.split();

        writer
            .write_frame(Bytes::from_static(b"out"))
            .await
            .unwrap();

        match client.next().await {
            Some(Ok(Message::Binary(data))) => assert_eq!(data, &b"out"[..]),
            other => panic!("Expected binary message, got {:?}", other),
        }
    }
}
