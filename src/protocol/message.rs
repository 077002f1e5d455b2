//! Signaling message types
//!
//! Client-originated messages name a session by its raw string; the
//! multiplexer validates it into a [`SessionName`] before touching the
//! registry. Negotiation payloads (`sdp`, `candidate`) are opaque bytes.

use std::fmt;

use bytes::Bytes;

use super::constants::MAX_SESSION_NAME_LEN;

/// Validated name of a signaling session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionName(String);

impl SessionName {
    /// Validate a session name
    ///
    /// Returns `None` if the name is empty or longer than
    /// [`MAX_SESSION_NAME_LEN`] bytes.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_SESSION_NAME_LEN {
            return None;
        }
        Some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier assigned to each accepted connection
///
/// Allocated from a monotonic counter, so an id is never reused within a
/// server's lifetime. Its decimal form is the `peer_id` seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signaling message, in either direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    /// Join (or create) a session
    JoinRequest { session: String },
    /// Leave a session
    LeaveNotice { session: String },
    /// Session description offer
    Offer { session: String, sdp: Bytes },
    /// Session description answer
    Answer { session: String, sdp: Bytes },
    /// Trickled ICE candidate
    IceCandidate { session: String, candidate: Bytes },
    /// Sender has no more ICE candidates
    EndOfCandidates { session: String },
    /// A peer joined a session (server to client)
    PeerJoined { session: String, peer_id: String },
    /// A peer left a session (server to client)
    PeerLeft { session: String, peer_id: String },
    /// Join acknowledgement carrying the joiner's own id (server to client)
    Joined { session: String, peer_id: String },
    /// Ask for the list of open sessions
    ListSessions,
    /// Open sessions (server to client)
    SessionList { sessions: Vec<String> },
    /// Error report
    Error { reason: String },
}

impl SignalMessage {
    pub fn join(session: impl Into<String>) -> Self {
        SignalMessage::JoinRequest {
            session: session.into(),
        }
    }

    pub fn leave(session: impl Into<String>) -> Self {
        SignalMessage::LeaveNotice {
            session: session.into(),
        }
    }

    pub fn offer(session: impl Into<String>, sdp: impl Into<Bytes>) -> Self {
        SignalMessage::Offer {
            session: session.into(),
            sdp: sdp.into(),
        }
    }

    pub fn answer(session: impl Into<String>, sdp: impl Into<Bytes>) -> Self {
        SignalMessage::Answer {
            session: session.into(),
            sdp: sdp.into(),
        }
    }

    pub fn ice_candidate(session: impl Into<String>, candidate: impl Into<Bytes>) -> Self {
        SignalMessage::IceCandidate {
            session: session.into(),
            candidate: candidate.into(),
        }
    }

    pub fn error(reason: impl fmt::Display) -> Self {
        SignalMessage::Error {
            reason: reason.to_string(),
        }
    }

    /// Session the message refers to, if any
    pub fn session(&self) -> Option<&str> {
        match self {
            SignalMessage::JoinRequest { session }
            | SignalMessage::LeaveNotice { session }
            | SignalMessage::Offer { session, .. }
            | SignalMessage::Answer { session, .. }
            | SignalMessage::IceCandidate { session, .. }
            | SignalMessage::EndOfCandidates { session }
            | SignalMessage::PeerJoined { session, .. }
            | SignalMessage::PeerLeft { session, .. }
            | SignalMessage::Joined { session, .. } => Some(session),
            SignalMessage::ListSessions
            | SignalMessage::SessionList { .. }
            | SignalMessage::Error { .. } => None,
        }
    }

    /// Short name for logs and error reasons
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::JoinRequest { .. } => "join-request",
            SignalMessage::LeaveNotice { .. } => "leave-notice",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::EndOfCandidates { .. } => "end-of-candidates",
            SignalMessage::PeerJoined { .. } => "peer-joined",
            SignalMessage::PeerLeft { .. } => "peer-left",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::ListSessions => "list-sessions",
            SignalMessage::SessionList { .. } => "session-list",
            SignalMessage::Error { .. } => "error",
        }
    }

    /// Whether the message is negotiation traffic forwarded between peers
    pub fn is_relayable(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::IceCandidate { .. }
                | SignalMessage::EndOfCandidates { .. }
        )
    }
}
