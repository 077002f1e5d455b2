//! Session state
//!
//! This module defines the per-session state stored in the registry: the
//! ordered member list, each member's role, and the negotiation cache used
//! to bring late joiners up to date.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::protocol::{ConnectionId, SessionName, SignalMessage};

use super::config::RegistryConfig;
use super::error::RegistryError;

/// Role of a member within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the session with the first join
    Initiator,
    /// Joined an existing session
    Responder,
}

/// A session member
#[derive(Debug, Clone)]
pub struct Member {
    pub id: ConnectionId,
    pub role: Role,
    pub joined_at: Instant,
}

/// Negotiation state cached per member for late joiners
#[derive(Debug, Default)]
struct NegotiationCache {
    offer: Option<Bytes>,
    candidates: VecDeque<Bytes>,
    end_of_candidates: bool,
}

/// A named signaling session
#[derive(Debug)]
pub struct Session {
    name: SessionName,

    /// Members in join order
    members: Vec<Member>,

    /// Cached negotiation state, keyed by member
    negotiation: HashMap<ConnectionId, NegotiationCache>,

    /// Set once the registry has removed this session; joiners holding a
    /// stale handle must go back to the registry
    closed: bool,

    /// When the session was created
    pub created_at: Instant,

    max_members: usize,
    replay_negotiation: bool,
    max_cached_candidates: usize,
}

impl Session {
    /// Create an empty session
    pub(super) fn new(name: SessionName, config: &RegistryConfig) -> Self {
        Self {
            name,
            members: Vec::new(),
            negotiation: HashMap::new(),
            closed: false,
            created_at: Instant::now(),
            max_members: config.max_members,
            replay_negotiation: config.replay_negotiation,
            max_cached_candidates: config.max_cached_candidates,
        }
    }

    pub fn name(&self) -> &SessionName {
        &self.name
    }

    /// Add a member
    ///
    /// Returns the members present before the join, in join order.
    pub fn join(&mut self, id: ConnectionId) -> Result<Vec<ConnectionId>, RegistryError> {
        if self.is_member(id) {
            return Err(RegistryError::AlreadyJoined(self.name.clone()));
        }
        if self.max_members > 0 && self.members.len() >= self.max_members {
            return Err(RegistryError::SessionFull(self.name.clone()));
        }

        let existing = self.member_ids();
        let role = if self.members.is_empty() {
            Role::Initiator
        } else {
            Role::Responder
        };

        self.members.push(Member {
            id,
            role,
            joined_at: Instant::now(),
        });

        Ok(existing)
    }

    /// Remove a member
    ///
    /// Returns the members that remain. An empty result means the session
    /// should be destroyed.
    pub fn leave(&mut self, id: ConnectionId) -> Result<Vec<ConnectionId>, RegistryError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| RegistryError::NotJoined(self.name.clone()))?;

        self.members.remove(idx);
        self.negotiation.remove(&id);

        Ok(self.member_ids())
    }

    /// Members a relay from `sender` goes to
    ///
    /// Fails if `sender` is not a member.
    pub fn relay_targets(&self, sender: ConnectionId) -> Result<Vec<ConnectionId>, RegistryError> {
        if !self.is_member(sender) {
            return Err(RegistryError::NotJoined(self.name.clone()));
        }

        Ok(self
            .members
            .iter()
            .map(|m| m.id)
            .filter(|id| *id != sender)
            .collect())
    }

    /// Update the sender's negotiation cache from a relayed message
    pub fn record(&mut self, sender: ConnectionId, message: &SignalMessage) {
        if !self.replay_negotiation {
            return;
        }

        let cache = self.negotiation.entry(sender).or_default();
        match message {
            SignalMessage::Offer { sdp, .. } => {
                // A new offer restarts negotiation
                cache.offer = Some(sdp.clone());
                cache.candidates.clear();
                cache.end_of_candidates = false;
            }
            SignalMessage::IceCandidate { candidate, .. } => {
                if self.max_cached_candidates == 0 {
                    return;
                }
                if cache.candidates.len() >= self.max_cached_candidates {
                    cache.candidates.pop_front();
                }
                cache.candidates.push_back(candidate.clone());
                cache.end_of_candidates = false;
            }
            SignalMessage::EndOfCandidates { .. } => {
                cache.end_of_candidates = true;
            }
            _ => {}
        }
    }

    /// Messages that introduce the existing members to a new joiner
    ///
    /// For each other member, in join order: `PeerJoined`, followed by that
    /// member's cached offer, candidates, and end-of-candidates marker.
    pub fn introductions(&self, joiner: ConnectionId) -> Vec<SignalMessage> {
        let session = self.name.as_str();
        let mut messages = Vec::new();

        for member in self.members.iter().filter(|m| m.id != joiner) {
            messages.push(SignalMessage::PeerJoined {
                session: session.to_owned(),
                peer_id: member.id.to_string(),
            });

            if !self.replay_negotiation {
                continue;
            }

            if let Some(cache) = self.negotiation.get(&member.id) {
                if let Some(ref sdp) = cache.offer {
                    messages.push(SignalMessage::offer(session, sdp.clone()));
                }
                for candidate in &cache.candidates {
                    messages.push(SignalMessage::ice_candidate(session, candidate.clone()));
                }
                if cache.end_of_candidates {
                    messages.push(SignalMessage::EndOfCandidates {
                        session: session.to_owned(),
                    });
                }
            }
        }

        messages
    }

    pub fn is_member(&self, id: ConnectionId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.members.iter().find(|m| m.id == id).map(|m| m.role)
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(super) fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Time since the session was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            member_count: self.members.len(),
            initiator: self
                .members
                .iter()
                .find(|m| m.role == Role::Initiator)
                .map(|m| m.id),
            age: self.age(),
            cached_offers: self
                .negotiation
                .values()
                .filter(|c| c.offer.is_some())
                .count(),
            cached_candidates: self.negotiation.values().map(|c| c.candidates.len()).sum(),
        }
    }
}

/// Statistics for a session
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Current member count
    pub member_count: usize,
    /// Creator of the session, if still a member
    pub initiator: Option<ConnectionId>,
    /// Time since creation
    pub age: Duration,
    /// Members with a cached offer
    pub cached_offers: usize,
    /// ICE candidates cached across members
    pub cached_candidates: usize,
}
