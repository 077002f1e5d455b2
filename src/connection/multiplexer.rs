//! Connection multiplexer
//!
//! One multiplexer per connection. It decodes inbound frames, dispatches
//! them against the session registry and tracks which sessions the
//! connection belongs to, so a single socket can take part in any number
//! of sessions at once.
//!
//! Decode failures and protocol violations are answered with an `Error`
//! message and the connection stays open. Only transport failures end it.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, ProtocolError};
use crate::protocol::{decode, ConnectionId, SessionName, SignalMessage};
use crate::registry::SessionRegistry;
use crate::server::handler::RelayHandler;

use super::context::ConnectionContext;
use super::outbound::OutboundQueue;
use super::state::ConnectionState;

/// Routes one connection's traffic into and out of its sessions
pub struct ConnectionMultiplexer<H: RelayHandler> {
    context: ConnectionContext,
    state: ConnectionState,
    outbound: OutboundQueue,
    registry: Arc<SessionRegistry>,
    handler: Arc<H>,
    max_sessions: usize,
}

impl<H: RelayHandler> ConnectionMultiplexer<H> {
    /// Create a multiplexer
    ///
    /// `outbound` must already be registered in the registry's peer
    /// directory. `max_sessions` caps concurrent memberships (0 = unlimited).
    pub fn new(
        context: ConnectionContext,
        outbound: OutboundQueue,
        registry: Arc<SessionRegistry>,
        handler: Arc<H>,
        max_sessions: usize,
    ) -> Self {
        let state = ConnectionState::new(context.connection_id, context.peer_addr);
        Self {
            context,
            state,
            outbound,
            registry,
            handler,
            max_sessions,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    fn id(&self) -> ConnectionId {
        self.context.connection_id
    }

    /// Decode one inbound frame and act on it
    pub async fn handle_inbound(&mut self, frame: Bytes) {
        self.state.frames_received += 1;

        let message = match decode(frame) {
            Ok(message) => message,
            Err(e) => {
                self.state.decode_errors += 1;
                tracing::debug!(
                    connection_id = %self.id(),
                    error = %e,
                    "Failed to decode frame"
                );
                self.enqueue_outbound(SignalMessage::error(Error::Codec(e)));
                return;
            }
        };

        tracing::trace!(
            connection_id = %self.id(),
            kind = message.kind(),
            "Received message"
        );

        if let Err(e) = self.dispatch(message).await {
            self.state.protocol_errors += 1;
            tracing::debug!(
                connection_id = %self.id(),
                error = %e,
                "Protocol violation"
            );
            self.enqueue_outbound(SignalMessage::error(Error::Protocol(e)));
        }
    }

    /// Queue a message for this connection without waiting
    ///
    /// Returns false if the queue is full (the connection is then closed as
    /// lagging) or already shut down.
    pub fn enqueue_outbound(&self, message: SignalMessage) -> bool {
        self.outbound.enqueue(message)
    }

    /// Leave every joined session
    ///
    /// Consumes the multiplexer, so cleanup runs once. Returns the final
    /// connection state.
    pub async fn on_disconnect(mut self) -> ConnectionState {
        let id = self.id();
        let sessions = self.state.close();

        for name in &sessions {
            match self.registry.leave(name, id).await {
                Ok(outcome) => {
                    if outcome.removed {
                        self.handler.on_session_closed(name).await;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %id,
                        session = %name,
                        error = %e,
                        "Leave on disconnect failed"
                    );
                }
            }
        }

        tracing::debug!(
            connection_id = %id,
            sessions = sessions.len(),
            frames = self.state.frames_received,
            "Connection left all sessions"
        );

        self.state
    }

    async fn dispatch(&mut self, message: SignalMessage) -> Result<(), ProtocolError> {
        match message {
            SignalMessage::JoinRequest { session } => self.join(session).await,
            SignalMessage::LeaveNotice { session } => self.leave(&session).await,
            SignalMessage::ListSessions => {
                let sessions = self
                    .registry
                    .list_sessions()
                    .await
                    .into_iter()
                    .map(SessionName::into_string)
                    .collect();
                self.enqueue_outbound(SignalMessage::SessionList { sessions });
                Ok(())
            }
            SignalMessage::Error { reason } => {
                // Answering would risk an error ping-pong
                tracing::debug!(
                    connection_id = %self.id(),
                    reason = %reason,
                    "Client reported error"
                );
                Ok(())
            }
            message if message.is_relayable() => self.relay(message).await,
            other => Err(ProtocolError::UnexpectedMessage(other.kind())),
        }
    }

    async fn join(&mut self, session: String) -> Result<(), ProtocolError> {
        let name = SessionName::new(session).ok_or(ProtocolError::InvalidSessionName)?;

        if self.state.is_member(&name) {
            return Err(ProtocolError::AlreadyJoined(name.into_string()));
        }
        if self.max_sessions > 0 && self.state.session_count() >= self.max_sessions {
            return Err(ProtocolError::TooManySessions(self.max_sessions));
        }

        let outcome = self.registry.join(&name, self.id()).await?;
        self.state.add_session(name.clone());

        tracing::debug!(
            connection_id = %self.id(),
            session = %name,
            role = ?outcome.role,
            peers = outcome.peers.len(),
            "Joined session"
        );

        if outcome.created() {
            self.handler.on_session_created(&self.context, &name).await;
        }
        Ok(())
    }

    async fn leave(&mut self, session: &str) -> Result<(), ProtocolError> {
        let name = self.member_session(session)?;
        self.state.remove_session(&name);

        let outcome = self.registry.leave(&name, self.id()).await?;

        tracing::debug!(
            connection_id = %self.id(),
            session = %name,
            remaining = outcome.remaining.len(),
            "Left session"
        );

        if outcome.removed {
            self.handler.on_session_closed(&name).await;
        }
        Ok(())
    }

    async fn relay(&mut self, message: SignalMessage) -> Result<(), ProtocolError> {
        let name = self.member_session(message.session().unwrap_or_default())?;
        self.registry.relay(&name, self.id(), message).await?;
        Ok(())
    }

    /// Resolve a session this connection has joined
    fn member_session(&self, session: &str) -> Result<SessionName, ProtocolError> {
        SessionName::new(session)
            .filter(|name| self.state.is_member(name))
            .ok_or_else(|| ProtocolError::NotJoined(session.to_string()))
    }
}
