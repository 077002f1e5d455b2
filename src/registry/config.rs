//! Registry configuration

use crate::protocol::constants::DEFAULT_MAX_CACHED_CANDIDATES;

/// Session registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum members per session (0 = unlimited)
    pub max_members: usize,

    /// Replay cached offers and ICE candidates to late joiners
    pub replay_negotiation: bool,

    /// Maximum ICE candidates cached per member for replay
    pub max_cached_candidates: usize,

    /// Push `SessionList` to every connection when it connects and
    /// whenever a session is created or removed
    pub announce_sessions: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_members: 0,
            replay_negotiation: true,
            max_cached_candidates: DEFAULT_MAX_CACHED_CANDIDATES,
            announce_sessions: false,
        }
    }
}

impl RegistryConfig {
    /// Set the per-session member limit
    pub fn max_members(mut self, max: usize) -> Self {
        self.max_members = max;
        self
    }

    /// Disable negotiation replay for late joiners
    pub fn disable_replay(mut self) -> Self {
        self.replay_negotiation = false;
        self
    }

    /// Set the per-member candidate cache size
    pub fn max_cached_candidates(mut self, max: usize) -> Self {
        self.max_cached_candidates = max;
        self
    }

    /// Push session list changes to every connection
    pub fn announce_sessions(mut self) -> Self {
        self.announce_sessions = true;
        self
    }
}
