//! Connection state machine
//!
//! Tracks one connection from accept to close, including the set of
//! sessions it currently belongs to.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Instant;

use crate::protocol::{ConnectionId, SessionName};

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Accepted, member of no session
    Connected,
    /// Member of at least one session
    Active,
    /// Transport closed; terminal
    Closed,
}

/// Complete connection state
#[derive(Debug)]
pub struct ConnectionState {
    /// Unique connection ID
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: ConnectionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Sessions joined and not yet left
    sessions: BTreeSet<SessionName>,

    /// Frames received
    pub frames_received: u64,

    /// Frames that failed to decode
    pub decode_errors: u64,

    /// Messages rejected as protocol violations
    pub protocol_errors: u64,
}

impl ConnectionState {
    /// Create a new connection state
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: ConnectionPhase::Connected,
            connected_at: Instant::now(),
            sessions: BTreeSet::new(),
            frames_received: 0,
            decode_errors: 0,
            protocol_errors: 0,
        }
    }

    /// Record a successful join
    ///
    /// Returns false if the session was already recorded or the connection
    /// is closed.
    pub fn add_session(&mut self, name: SessionName) -> bool {
        if self.phase == ConnectionPhase::Closed {
            return false;
        }
        let inserted = self.sessions.insert(name);
        if inserted {
            self.phase = ConnectionPhase::Active;
        }
        inserted
    }

    /// Record a successful leave
    pub fn remove_session(&mut self, name: &SessionName) -> bool {
        let removed = self.sessions.remove(name);
        if removed && self.sessions.is_empty() && self.phase == ConnectionPhase::Active {
            self.phase = ConnectionPhase::Connected;
        }
        removed
    }

    pub fn is_member(&self, name: &SessionName) -> bool {
        self.sessions.contains(name)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionName> {
        self.sessions.iter()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Move to the terminal phase, handing back every joined session
    pub fn close(&mut self) -> Vec<SessionName> {
        self.phase = ConnectionPhase::Closed;
        std::mem::take(&mut self.sessions).into_iter().collect()
    }

    /// Get connection duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Check if connection is in at least one session
    pub fn is_active(&self) -> bool {
        self.phase == ConnectionPhase::Active
    }
}
