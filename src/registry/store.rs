//! Session registry implementation
//!
//! The central registry that owns all live sessions and routes signaling
//! messages between their members.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::protocol::{ConnectionId, SessionName, SignalMessage};

use super::config::RegistryConfig;
use super::directory::PeerDirectory;
use super::error::RegistryError;
use super::session::{Role, Session, SessionStats};

/// Shared handle to a session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Members present before the join, in join order
    pub peers: Vec<ConnectionId>,
    /// Role assigned to the joiner
    pub role: Role,
}

impl JoinOutcome {
    /// Whether this join created the session
    pub fn created(&self) -> bool {
        self.role == Role::Initiator
    }
}

/// Result of a successful leave
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// Members still in the session
    pub remaining: Vec<ConnectionId>,
    /// Whether the session was removed from the registry
    pub removed: bool,
}

/// Central registry for all live sessions
///
/// Locking is two-level: the name → session map, then one mutex per
/// session. Traffic in unrelated sessions never contends on the same lock.
/// Locks are always taken map first, then session, then peer directory.
pub struct SessionRegistry {
    /// Map of session name to session
    sessions: RwLock<HashMap<SessionName, SessionHandle>>,

    /// Connection id → outbound queue
    directory: PeerDirectory,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new session registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new session registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            directory: PeerDirectory::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the peer directory
    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Return the session named `name`, creating it if needed
    ///
    /// Concurrent callers with the same new name all observe the single
    /// instance created by whichever caller took the write lock first.
    pub async fn get_or_create(&self, name: &SessionName) -> SessionHandle {
        if let Some(session) = self.sessions.read().await.get(name) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(name.clone()).or_insert_with(|| {
            tracing::info!(session = %name, "Session created");
            Arc::new(Mutex::new(Session::new(name.clone(), &self.config)))
        });
        Arc::clone(session)
    }

    /// Remove the session if it has no members
    ///
    /// The emptiness check runs while both the map and the session are
    /// locked, so a join that slipped in after the last leave keeps the
    /// session alive. Returns true if the session was removed.
    pub async fn remove_if_empty(&self, name: &SessionName) -> bool {
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get(name) else {
            return false;
        };

        let mut session = session.lock().await;
        if !session.is_empty() {
            return false;
        }

        session.mark_closed();
        drop(session);
        sessions.remove(name);
        drop(sessions);

        tracing::info!(session = %name, "Session removed");
        self.announce_sessions().await;
        true
    }

    /// Join `id` to the session named `name`, creating it on first join
    ///
    /// Existing members get `PeerJoined`. The joiner gets `Joined`, then
    /// the introductions for every existing member. All of it is queued
    /// under the session lock, so the joiner always learns about a peer
    /// before receiving anything that peer relays.
    pub async fn join(
        &self,
        name: &SessionName,
        id: ConnectionId,
    ) -> Result<JoinOutcome, RegistryError> {
        let outcome = loop {
            let handle = self.get_or_create(name).await;
            let mut session = handle.lock().await;

            // Lost a race with remove_if_empty; this instance is gone
            if session.is_closed() {
                continue;
            }

            let peers = session.join(id)?;
            let role = session.role_of(id).unwrap_or(Role::Responder);

            let joined = SignalMessage::PeerJoined {
                session: name.to_string(),
                peer_id: id.to_string(),
            };
            self.directory.deliver(&peers, &joined).await;

            let mut welcome = vec![SignalMessage::Joined {
                session: name.to_string(),
                peer_id: id.to_string(),
            }];
            welcome.extend(session.introductions(id));
            self.directory.deliver_all(id, welcome).await;

            tracing::debug!(
                session = %name,
                connection_id = %id,
                role = ?role,
                members = session.member_count(),
                "Member joined"
            );

            break JoinOutcome { peers, role };
        };

        // Announced after the session lock is released; the map lock comes first
        if outcome.created() {
            self.announce_sessions().await;
        }

        Ok(outcome)
    }

    /// Remove `id` from the session named `name`
    ///
    /// Remaining members get `PeerLeft`. If the session becomes empty it is
    /// removed from the registry.
    pub async fn leave(
        &self,
        name: &SessionName,
        id: ConnectionId,
    ) -> Result<LeaveOutcome, RegistryError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotJoined(name.clone()))?;

        let remaining = {
            let mut session = handle.lock().await;
            if session.is_closed() {
                return Err(RegistryError::NotJoined(name.clone()));
            }

            let remaining = session.leave(id)?;

            let left = SignalMessage::PeerLeft {
                session: name.to_string(),
                peer_id: id.to_string(),
            };
            self.directory.deliver(&remaining, &left).await;

            tracing::debug!(
                session = %name,
                connection_id = %id,
                members = remaining.len(),
                "Member left"
            );

            remaining
        };

        let removed = remaining.is_empty() && self.remove_if_empty(name).await;

        Ok(LeaveOutcome { remaining, removed })
    }

    /// Forward a message from `sender` to every other member of `name`
    ///
    /// Returns the number of members the message was queued for. Messages
    /// from one sender are queued in call order, so each recipient sees
    /// them in the order they were sent.
    pub async fn relay(
        &self,
        name: &SessionName,
        sender: ConnectionId,
        message: SignalMessage,
    ) -> Result<usize, RegistryError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotJoined(name.clone()))?;

        let mut session = handle.lock().await;
        if session.is_closed() {
            return Err(RegistryError::NotJoined(name.clone()));
        }

        let targets = session.relay_targets(sender)?;
        session.record(sender, &message);

        let delivered = self.directory.deliver(&targets, &message).await;

        tracing::trace!(
            session = %name,
            sender = %sender,
            kind = message.kind(),
            targets = targets.len(),
            delivered = delivered,
            "Message relayed"
        );

        Ok(delivered)
    }

    /// Names of all live sessions, sorted
    pub async fn list_sessions(&self) -> Vec<SessionName> {
        sorted_names(&*self.sessions.read().await)
    }

    /// Push the current session list to every connection
    ///
    /// No-op unless `announce_sessions` is set in the config. The list
    /// is built and queued under the map read lock, so no create or remove
    /// lands in between and every connection sees snapshots in order.
    async fn announce_sessions(&self) {
        if !self.config.announce_sessions {
            return;
        }

        let sessions = self.sessions.read().await;
        let message = session_list(&sessions);
        let delivered = self.directory.broadcast(&message).await;
        tracing::trace!(sessions = sessions.len(), delivered, "Session list announced");
    }

    /// Send the current session list to one newly connected peer
    ///
    /// No-op unless `announce_sessions` is set in the config.
    pub async fn announce_sessions_to(&self, id: ConnectionId) {
        if !self.config.announce_sessions {
            return;
        }

        let sessions = self.sessions.read().await;
        self.directory.deliver(&[id], &session_list(&sessions)).await;
    }

    /// Check if a session exists
    pub async fn contains(&self, name: &SessionName) -> bool {
        self.sessions.read().await.contains_key(name)
    }

    /// Get session statistics
    pub async fn session_stats(&self, name: &SessionName) -> Option<SessionStats> {
        let handle = self.sessions.read().await.get(name).cloned()?;
        let session = handle.lock().await;
        Some(session.stats())
    }

    /// Get total number of sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn sorted_names(sessions: &HashMap<SessionName, SessionHandle>) -> Vec<SessionName> {
    let mut names: Vec<SessionName> = sessions.keys().cloned().collect();
    names.sort();
    names
}

fn session_list(sessions: &HashMap<SessionName, SessionHandle>) -> SignalMessage {
    SignalMessage::SessionList {
        sessions: sorted_names(sessions)
            .into_iter()
            .map(SessionName::into_string)
            .collect(),
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::connection::{OutboundQueue, OutboundReceiver};

    fn name(s: &str) -> SessionName {
        SessionName::new(s).unwrap()
    }

    async fn connect(registry: &SessionRegistry, id: u64) -> OutboundReceiver {
        let (queue, rx) = OutboundQueue::channel(ConnectionId(id), 64);
        registry.directory().register(queue).await;
        rx
    }

    /// Collect everything currently queued
    async fn drain(rx: &mut OutboundReceiver) -> Vec<SignalMessage> {
        let mut out = Vec::new();
        while let Ok(Some(message)) =
            tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv()).await
        {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let registry = SessionRegistry::new();
        let key = name("room1");

        let a = registry.get_or_create(&key).await;
        let b = registry.get_or_create(&key).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create() {
        let registry = Arc::new(SessionRegistry::new());
        let key = name("contended");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                tokio::spawn(async move { registry.get_or_create(&key).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_join_notifies_both_sides() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let mut rx_a = connect(&registry, 1).await;
        let mut rx_b = connect(&registry, 2).await;

        let outcome = registry.join(&key, ConnectionId(1)).await.unwrap();
        assert!(outcome.created());
        assert!(outcome.peers.is_empty());

        let outcome = registry.join(&key, ConnectionId(2)).await.unwrap();
        assert!(!outcome.created());
        assert_eq!(outcome.peers, vec![ConnectionId(1)]);

        assert_eq!(
            drain(&mut rx_a).await,
            vec![
                SignalMessage::Joined {
                    session: "room1".into(),
                    peer_id: "1".into()
                },
                SignalMessage::PeerJoined {
                    session: "room1".into(),
                    peer_id: "2".into()
                },
            ]
        );
        assert_eq!(
            drain(&mut rx_b).await,
            vec![
                SignalMessage::Joined {
                    session: "room1".into(),
                    peer_id: "2".into()
                },
                SignalMessage::PeerJoined {
                    session: "room1".into(),
                    peer_id: "1".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_join() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx = connect(&registry, 1).await;

        registry.join(&key, ConnectionId(1)).await.unwrap();
        let result = registry.join(&key, ConnectionId(1)).await;
        assert!(matches!(result, Err(RegistryError::AlreadyJoined(_))));
    }

    #[tokio::test]
    async fn test_session_exists_iff_members() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx1 = connect(&registry, 1).await;
        let _rx2 = connect(&registry, 2).await;

        assert!(!registry.contains(&key).await);

        registry.join(&key, ConnectionId(1)).await.unwrap();
        assert!(registry.contains(&key).await);

        registry.join(&key, ConnectionId(2)).await.unwrap();
        let outcome = registry.leave(&key, ConnectionId(1)).await.unwrap();
        assert!(!outcome.removed);
        assert!(registry.contains(&key).await);

        let outcome = registry.leave(&key, ConnectionId(2)).await.unwrap();
        assert!(outcome.removed);
        assert!(!registry.contains(&key).await);

        let result = registry.leave(&key, ConnectionId(2)).await;
        assert!(matches!(result, Err(RegistryError::NotJoined(_))));
    }

    #[tokio::test]
    async fn test_rejoin_creates_fresh_session() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx1 = connect(&registry, 1).await;
        let mut rx2 = connect(&registry, 2).await;

        registry.join(&key, ConnectionId(1)).await.unwrap();
        let old = registry.get_or_create(&key).await;
        registry.leave(&key, ConnectionId(1)).await.unwrap();

        let outcome = registry.join(&key, ConnectionId(2)).await.unwrap();
        assert!(outcome.created());
        assert!(outcome.peers.is_empty());

        let new = registry.get_or_create(&key).await;
        assert!(!Arc::ptr_eq(&old, &new));

        // Only the join acknowledgement, no stale peers
        assert_eq!(drain(&mut rx2).await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_if_empty_keeps_populated_session() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx = connect(&registry, 1).await;

        registry.join(&key, ConnectionId(1)).await.unwrap();
        assert!(!registry.remove_if_empty(&key).await);
        assert!(registry.contains(&key).await);
        assert!(!registry.remove_if_empty(&name("missing")).await);
    }

    #[tokio::test]
    async fn test_join_after_stale_handle_removed() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx = connect(&registry, 1).await;

        // Empty session created, then reaped before anyone joins
        let stale = registry.get_or_create(&key).await;
        assert!(registry.remove_if_empty(&key).await);
        assert!(stale.lock().await.is_closed());

        registry.join(&key, ConnectionId(1)).await.unwrap();
        let live = registry.get_or_create(&key).await;
        assert!(!Arc::ptr_eq(&stale, &live));
        assert_eq!(live.lock().await.member_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_leave_never_orphans() {
        let registry = Arc::new(SessionRegistry::new());
        let key = name("churn");
        let mut receivers = Vec::new();
        for id in 0..8 {
            receivers.push(connect(&registry, id).await);
        }

        let tasks: Vec<_> = (0..8)
            .map(|id| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        registry.join(&key, ConnectionId(id)).await.unwrap();
                        registry.leave(&key, ConnectionId(id)).await.unwrap();
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(!registry.contains(&key).await);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_relay_excludes_sender_and_rejects_non_members() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let mut rx_a = connect(&registry, 1).await;
        let mut rx_b = connect(&registry, 2).await;
        let mut rx_c = connect(&registry, 3).await;

        registry.join(&key, ConnectionId(1)).await.unwrap();
        registry.join(&key, ConnectionId(2)).await.unwrap();
        drain(&mut rx_a).await;
        drain(&mut rx_b).await;

        let offer = SignalMessage::offer("room1", Bytes::from_static(b"sdp-x"));
        let delivered = registry
            .relay(&key, ConnectionId(1), offer.clone())
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut rx_b).await, vec![offer.clone()]);
        assert!(drain(&mut rx_a).await.is_empty());

        let result = registry.relay(&key, ConnectionId(3), offer).await;
        assert!(matches!(result, Err(RegistryError::NotJoined(_))));
        assert!(drain(&mut rx_a).await.is_empty());
        assert!(drain(&mut rx_b).await.is_empty());
        assert!(drain(&mut rx_c).await.is_empty());
    }

    #[tokio::test]
    async fn test_late_joiner_gets_cached_offer() {
        let registry = SessionRegistry::new();
        let key = name("room1");
        let _rx_a = connect(&registry, 1).await;
        let mut rx_b = connect(&registry, 2).await;

        registry.join(&key, ConnectionId(1)).await.unwrap();
        let offer = SignalMessage::offer("room1", Bytes::from_static(b"sdp-a"));
        registry
            .relay(&key, ConnectionId(1), offer.clone())
            .await
            .unwrap();

        registry.join(&key, ConnectionId(2)).await.unwrap();
        let received = drain(&mut rx_b).await;
        assert_eq!(received.len(), 3);
        assert_eq!(received[2], offer);

        let stats = registry.session_stats(&key).await.unwrap();
        assert_eq!(stats.member_count, 2);
        assert_eq!(stats.initiator, Some(ConnectionId(1)));
        assert_eq!(stats.cached_offers, 1);
    }

    #[tokio::test]
    async fn test_list_sessions_sorted() {
        let registry = SessionRegistry::new();
        let _rx = connect(&registry, 1).await;

        registry.join(&name("b"), ConnectionId(1)).await.unwrap();
        registry.join(&name("a"), ConnectionId(1)).await.unwrap();

        assert_eq!(registry.list_sessions().await, vec![name("a"), name("b")]);
    }

    fn list(names: &[&str]) -> SignalMessage {
        SignalMessage::SessionList {
            sessions: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_session_changes_announced_to_all() {
        let registry = SessionRegistry::with_config(RegistryConfig::default().announce_sessions());
        let mut rx_a = connect(&registry, 1).await;
        let mut rx_b = connect(&registry, 2).await;

        registry.join(&name("room1"), ConnectionId(1)).await.unwrap();
        assert_eq!(
            drain(&mut rx_a).await,
            vec![
                SignalMessage::Joined {
                    session: "room1".into(),
                    peer_id: "1".into()
                },
                list(&["room1"]),
            ]
        );
        assert_eq!(drain(&mut rx_b).await, vec![list(&["room1"])]);

        // Joining an existing session changes nothing in the list
        registry.join(&name("room1"), ConnectionId(2)).await.unwrap();
        assert!(!drain(&mut rx_b).await.contains(&list(&["room1"])));
        drain(&mut rx_a).await;

        registry.leave(&name("room1"), ConnectionId(1)).await.unwrap();
        registry.leave(&name("room1"), ConnectionId(2)).await.unwrap();
        assert_eq!(
            drain(&mut rx_b).await,
            vec![
                SignalMessage::PeerLeft {
                    session: "room1".into(),
                    peer_id: "1".into()
                },
                list(&[]),
            ]
        );
        assert_eq!(drain(&mut rx_a).await, vec![list(&[])]);
    }

    #[tokio::test]
    async fn test_announce_to_new_connection() {
        let registry = SessionRegistry::with_config(RegistryConfig::default().announce_sessions());
        let _rx_a = connect(&registry, 1).await;
        registry.join(&name("b"), ConnectionId(1)).await.unwrap();
        registry.join(&name("a"), ConnectionId(1)).await.unwrap();

        let mut rx_c = connect(&registry, 3).await;
        registry.announce_sessions_to(ConnectionId(3)).await;
        assert_eq!(drain(&mut rx_c).await, vec![list(&["a", "b"])]);
    }

    #[tokio::test]
    async fn test_no_announcements_by_default() {
        let registry = SessionRegistry::new();
        let mut rx_a = connect(&registry, 1).await;
        let mut rx_b = connect(&registry, 2).await;

        registry.announce_sessions_to(ConnectionId(2)).await;
        registry.join(&name("room1"), ConnectionId(1)).await.unwrap();
        registry.leave(&name("room1"), ConnectionId(1)).await.unwrap();

        assert!(drain(&mut rx_b).await.is_empty());
        assert_eq!(drain(&mut rx_a).await.len(), 1);
    }
}
