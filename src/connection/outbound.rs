//! Per-connection outbound queue
//!
//! Every connection owns one bounded FIFO of messages waiting to be written.
//! Sessions enqueue without blocking; a single writer task drains the queue
//! and writes one frame at a time, so frames never interleave on the wire.
//!
//! A queue that fills up belongs to a client that stopped reading. Instead
//! of dropping negotiation messages (which would silently break a peer
//! connection), the queue is flagged as lagging and the connection is
//! closed.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use crate::error::{Error, Result};
use crate::protocol::{encode, ConnectionId, SignalMessage};
use crate::transport::FrameWriter;

use super::heartbeat::{Heartbeat, HeartbeatResult};

/// Sending half of a connection's outbound queue
///
/// Cheap to clone. The peer directory holds one clone per connection.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    connection_id: ConnectionId,
    tx: mpsc::Sender<SignalMessage>,
    lagged: Arc<Notify>,
}

/// Receiving half, drained by the writer task
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<SignalMessage>,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` pending messages
    pub fn channel(connection_id: ConnectionId, capacity: usize) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            connection_id,
            tx,
            lagged: Arc::new(Notify::new()),
        };
        (queue, OutboundReceiver { rx })
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Enqueue a message without waiting
    ///
    /// Returns false if the message was not queued, either because the
    /// connection is shutting down or because it is lagging.
    pub fn enqueue(&self, message: SignalMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    kind = message.kind(),
                    "Outbound queue full, closing lagging connection"
                );
                self.lagged.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Resolves once an enqueue has failed because the queue was full
    pub async fn lagged(&self) {
        self.lagged.notified().await;
    }
}

impl OutboundReceiver {
    /// Next queued message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<SignalMessage> {
        self.rx.recv().await
    }
}

/// Drain the queue onto the transport until every sender is dropped
///
/// With a heartbeat, the peer is also pinged on every tick. Returns an
/// error when a write fails or the heartbeat times out; the caller treats
/// either as a transport failure.
pub async fn write_loop<W: FrameWriter>(
    connection_id: ConnectionId,
    mut writer: W,
    mut queue: OutboundReceiver,
    heartbeat: Option<Heartbeat>,
) -> Result<()> {
    let mut heartbeat = heartbeat.filter(|_| writer.supports_ping());

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(message) = message else { break };
                tracing::trace!(
                    connection_id = %connection_id,
                    kind = message.kind(),
                    "Writing message"
                );
                writer.write_frame(encode(&message)).await?;
            }
            beat = next_beat(&mut heartbeat) => match beat {
                HeartbeatResult::TimedOut => {
                    tracing::warn!(connection_id = %connection_id, "Heartbeat timed out");
                    return Err(Error::Timeout);
                }
                HeartbeatResult::Missed(missed) => {
                    tracing::debug!(connection_id = %connection_id, missed, "Missed heartbeat");
                    writer.ping().await?;
                }
                HeartbeatResult::Alive => writer.ping().await?,
            },
        }
    }

    writer.close().await
}

async fn next_beat(heartbeat: &mut Option<Heartbeat>) -> HeartbeatResult {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => std::future::pending().await,
    }
}
