//! Peer directory
//!
//! Maps connection ids to their outbound queues. Sessions only store ids;
//! delivery resolves them here, so a session never holds a transport
//! handle and a departed connection simply stops resolving.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::connection::OutboundQueue;
use crate::protocol::{ConnectionId, SignalMessage};

/// Shared id → outbound queue directory
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: RwLock<HashMap<ConnectionId, OutboundQueue>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue
    pub async fn register(&self, queue: OutboundQueue) {
        let id = queue.connection_id();
        let prev = self.peers.write().await.insert(id, queue);
        if prev.is_some() {
            tracing::warn!(connection_id = %id, "Connection id registered twice");
        }
    }

    /// Remove a connection; returns its queue if it was registered
    pub async fn unregister(&self, id: ConnectionId) -> Option<OutboundQueue> {
        self.peers.write().await.remove(&id)
    }

    pub async fn get(&self, id: ConnectionId) -> Option<OutboundQueue> {
        self.peers.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Send one message to each target
    ///
    /// Returns how many targets accepted it. Unknown ids are skipped: the
    /// connection is mid-teardown and its own cleanup will remove it from
    /// the session.
    pub async fn deliver(&self, targets: &[ConnectionId], message: &SignalMessage) -> usize {
        let peers = self.peers.read().await;
        let mut delivered = 0;

        for id in targets {
            match peers.get(id) {
                Some(queue) => {
                    if queue.enqueue(message.clone()) {
                        delivered += 1;
                    }
                }
                None => {
                    tracing::debug!(connection_id = %id, "Delivery target not in directory");
                }
            }
        }

        delivered
    }

    /// Send one message to every registered connection
    pub async fn broadcast(&self, message: &SignalMessage) -> usize {
        let peers = self.peers.read().await;
        peers
            .values()
            .filter(|queue| queue.enqueue(message.clone()))
            .count()
    }

    /// Send messages to one connection, in order
    pub async fn deliver_all(&self, target: ConnectionId, messages: Vec<SignalMessage>) -> bool {
        let peers = self.peers.read().await;
        let Some(queue) = peers.get(&target) else {
            return false;
        };

        for message in messages {
            if !queue.enqueue(message) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_deliver_unregister() {
        let directory = PeerDirectory::new();
        let (q1, mut rx1) = OutboundQueue::channel(ConnectionId(1), 8);
        let (q2, mut rx2) = OutboundQueue::channel(ConnectionId(2), 8);
        directory.register(q1).await;
        directory.register(q2).await;
        assert_eq!(directory.len().await, 2);

        let message = SignalMessage::join("s");
        let delivered = directory
            .deliver(&[ConnectionId(1), ConnectionId(2), ConnectionId(3)], &message)
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await, Some(message.clone()));
        assert_eq!(rx2.recv().await, Some(message));

        assert!(directory.unregister(ConnectionId(1)).await.is_some());
        assert!(directory.get(ConnectionId(1)).await.is_none());
        assert!(directory.unregister(ConnectionId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_deliver_all_preserves_order() {
        let directory = PeerDirectory::new();
        let (q, mut rx) = OutboundQueue::channel(ConnectionId(5), 8);
        directory.register(q).await;

        let messages = vec![SignalMessage::join("a"), SignalMessage::leave("a")];
        assert!(directory.deliver_all(ConnectionId(5), messages).await);

        assert_eq!(rx.recv().await, Some(SignalMessage::join("a")));
        assert_eq!(rx.recv().await, Some(SignalMessage::leave("a")));
        assert!(!directory.deliver_all(ConnectionId(6), vec![]).await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let directory = PeerDirectory::new();
        let (q1, mut rx1) = OutboundQueue::channel(ConnectionId(1), 8);
        let (q2, mut rx2) = OutboundQueue::channel(ConnectionId(2), 8);
        let (q3, rx3) = OutboundQueue::channel(ConnectionId(3), 8);
        directory.register(q1).await;
        directory.register(q2).await;
        directory.register(q3).await;
        drop(rx3);

        let message = SignalMessage::SessionList {
            sessions: vec!["lobby".into()],
        };
        assert_eq!(directory.broadcast(&message).await, 2);
        assert_eq!(rx1.recv().await, Some(message.clone()));
        assert_eq!(rx2.recv().await, Some(message));
    }
}
