//! Per-connection task
//!
//! Owns one accepted transport. The read loop feeds the multiplexer while a
//! spawned writer task drains the outbound queue and pings the peer.
//! Whatever ends the connection (peer close, transport error, idle or
//! heartbeat timeout, lagging queue), cleanup is the same: leave every
//! session, drop out of the peer directory, then let the writer flush and
//! close.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinError;

use crate::connection::{
    write_loop, ConnectionContext, ConnectionMultiplexer, Heartbeat, Liveness, OutboundQueue,
};
use crate::error::{Error, Result};
use crate::registry::SessionRegistry;
use crate::server::config::ServerConfig;
use crate::server::handler::RelayHandler;
use crate::transport::{FrameReader, Transport};

/// Why the read loop stopped
enum Exit {
    /// Peer closed cleanly
    PeerClosed,
    /// Read failed or timed out
    ReadFailed(Error),
    /// Writer task ended on its own: a write error or a heartbeat timeout
    WriterDone(std::result::Result<Result<()>, JoinError>),
    /// Outbound queue overflowed
    Lagged,
}

/// One accepted connection
pub struct Connection<H: RelayHandler, T: Transport> {
    context: ConnectionContext,
    transport: T,
    config: ServerConfig,
    handler: Arc<H>,
    registry: Arc<SessionRegistry>,
}

impl<H: RelayHandler, T: Transport> Connection<H, T> {
    pub fn new(
        context: ConnectionContext,
        transport: T,
        config: ServerConfig,
        handler: Arc<H>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            context,
            transport,
            config,
            handler,
            registry,
        }
    }

    /// Run the connection to completion
    pub async fn run(self) -> Result<()> {
        let Self {
            context,
            transport,
            config,
            handler,
            registry,
        } = self;
        let id = context.connection_id;

        let (mut reader, writer) = transport.split();
        let liveness = Liveness::new();
        reader.watch_liveness(liveness.clone());
        let heartbeat = config
            .heartbeat_interval
            .map(|interval| Heartbeat::new(interval, config.heartbeat_timeout, liveness.clone()));

        let (outbound, queue) = OutboundQueue::channel(id, config.outbound_queue_capacity);
        registry.directory().register(outbound.clone()).await;
        let mut writer_task = tokio::spawn(write_loop(id, writer, queue, heartbeat));

        tracing::info!(
            connection_id = %id,
            peer = %context.peer_addr,
            transport = ?context.transport,
            "Connection established"
        );
        handler.on_connection(&context).await;
        registry.announce_sessions_to(id).await;

        let mut mux = ConnectionMultiplexer::new(
            context.clone(),
            outbound.clone(),
            Arc::clone(&registry),
            Arc::clone(&handler),
            config.max_sessions_per_connection,
        );

        let exit = loop {
            tokio::select! {
                frame = next_frame(&mut reader, config.idle_timeout) => match frame {
                    Ok(Some(frame)) => {
                        liveness.mark_alive();
                        mux.handle_inbound(frame).await;
                    }
                    Ok(None) => break Exit::PeerClosed,
                    Err(e) => break Exit::ReadFailed(e),
                },
                result = &mut writer_task => break Exit::WriterDone(result),
                _ = outbound.lagged() => break Exit::Lagged,
            }
        };

        // Sessions first, so nobody relays to a connection that is gone
        let state = mux.on_disconnect().await;
        registry.directory().unregister(id).await;
        drop(outbound);

        let result = match exit {
            Exit::PeerClosed => Ok(()),
            Exit::ReadFailed(e) => Err(e),
            Exit::Lagged => {
                tracing::warn!(connection_id = %id, "Closing lagging connection");
                Ok(())
            }
            Exit::WriterDone(Ok(result)) => result,
            Exit::WriterDone(Err(e)) => {
                tracing::error!(connection_id = %id, error = %e, "Writer task failed");
                Err(Error::ConnectionClosed)
            }
        };

        if !writer_task.is_finished() {
            // All senders are gone, so the writer drains what is left and closes
            match tokio::time::timeout(config.close_timeout, &mut writer_task).await {
                Ok(Ok(Err(e))) => {
                    tracing::debug!(connection_id = %id, error = %e, "Final flush failed");
                }
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(connection_id = %id, "Writer did not finish, aborting");
                    writer_task.abort();
                }
            }
        }

        handler.on_disconnect(&context).await;

        tracing::info!(
            connection_id = %id,
            duration_ms = state.duration().as_millis() as u64,
            frames = state.frames_received,
            decode_errors = state.decode_errors,
            protocol_errors = state.protocol_errors,
            "Connection closed"
        );

        result
    }
}

async fn next_frame<R: FrameReader>(
    reader: &mut R,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read_frame()).await?,
        None => reader.read_frame().await,
    }
}
