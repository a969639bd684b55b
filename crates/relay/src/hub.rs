//! Dashboard broadcast hub.
//!
//! Owns the set of observer connections. Each subscriber is an unbounded
//! sender feeding that connection's write half; `publish` serializes an
//! event once and attempts delivery to every current subscriber,
//! independently and best-effort. Failed subscribers are pruned in a
//! second pass after the delivery loop, never mid-iteration.

use crate::events::HubEvent;
use crate::registry::PeerSessionRegistry;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

/// Process-unique subscriber handle.
pub type SubscriberId = u64;

struct HubInner {
    next_id: SubscriberId,
    subscribers: HashMap<SubscriberId, mpsc::UnboundedSender<String>>,
}

/// Fan-out hub for dashboard observers.
pub struct DashboardHub {
    inner: Mutex<HubInner>,
}

impl Default for DashboardHub {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                next_id: 0,
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Add a subscriber, queueing a snapshot of the current peer set as
    /// its first frame.
    ///
    /// The snapshot is read and queued under the hub lock, making it
    /// atomic with the subscriber insertion: every event published after
    /// the registry state it captures is delivered to the subscriber,
    /// and nothing it lists can disappear without a `left` frame.
    pub async fn subscribe(
        &self,
        registry: &PeerSessionRegistry,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        let snapshot = HubEvent::Snapshot {
            peers: registry.snapshot().await,
        };
        if let Ok(json) = snapshot.to_json() {
            let _ = tx.send(json);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, tx);
        debug!(subscriber = id, total = inner.subscribers.len(), "dashboard subscribed");
        (id, rx)
    }

    /// Remove a subscriber. Idempotent.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.inner.lock().await;
        if inner.subscribers.remove(&id).is_some() {
            debug!(subscriber = id, total = inner.subscribers.len(), "dashboard unsubscribed");
        }
    }

    /// Fan an event out to every current subscriber.
    ///
    /// Delivery is best-effort per subscriber with no rollback and no
    /// retry; a failed subscriber is excluded from every later publish.
    pub async fn publish(&self, event: &HubEvent) {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(event = event.name(), error = %e, "failed to serialize event");
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        let mut stale = Vec::new();
        for (id, tx) in inner.subscribers.iter() {
            if tx.send(json.clone()).is_err() {
                stale.push(*id);
            }
        }
        for id in stale {
            inner.subscribers.remove(&id);
            debug!(subscriber = id, "pruned stale dashboard subscriber");
        }
    }

    /// Number of live subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Drop every subscriber, for shutdown. Closing the senders ends each
    /// connection's forward loop, which closes the socket.
    pub async fn drain(&self) {
        let mut inner = self.inner.lock().await;
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();
        debug!(dropped, "dashboard hub drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Peer;
    use crate::testutil::MockTransport;
    use crate::{RelayApp, RelayConfig};
    use serde_json::Value;
    use std::sync::Arc;

    fn peer(id: &str) -> Peer {
        Peer::new(id.to_string(), None, Arc::new(MockTransport::new()))
    }

    #[tokio::test]
    async fn test_snapshot_is_first_frame() {
        let hub = DashboardHub::new();
        let registry = PeerSessionRegistry::new();
        registry.insert(peer("p1")).await.unwrap();
        for _ in 0..4 {
            registry.record_sample("p1").await.unwrap();
        }

        let (_, mut rx) = hub.subscribe(&registry).await;
        hub.publish(&HubEvent::Left {
            peer_id: "p1".to_string(),
        })
        .await;

        let first: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["kind"], "snapshot");
        assert_eq!(first["peers"][0]["count"], 4);
        let second: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second["kind"], "left");
    }

    // A subscribe racing a peer teardown must never yield a ghost: the
    // snapshot either omits the peer or its `left` frame follows.
    #[tokio::test]
    async fn test_subscribe_racing_removal_never_leaves_ghost_peer() {
        for _ in 0..25 {
            let app = RelayApp::new(RelayConfig::default()).unwrap();
            app.registry.insert(peer("p1")).await.unwrap();

            let remover = {
                let app = Arc::clone(&app);
                tokio::spawn(async move { app.remove_peer("p1").await })
            };
            let (_, mut rx) = app.hub.subscribe(&app.registry).await;
            remover.await.unwrap();

            let snapshot: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(snapshot["kind"], "snapshot");
            let listed = snapshot["peers"]
                .as_array()
                .unwrap()
                .iter()
                .any(|p| p["peerId"] == "p1");
            if listed {
                let next: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
                assert_eq!(next["kind"], "left");
                assert_eq!(next["peerId"], "p1");
            }
        }
    }

    #[tokio::test]
    async fn test_failed_subscriber_is_pruned_others_unaffected() {
        let hub = DashboardHub::new();
        let registry = PeerSessionRegistry::new();
        let (_, dead_rx) = hub.subscribe(&registry).await;
        let (_, mut live_rx) = hub.subscribe(&registry).await;
        drop(dead_rx);

        hub.publish(&HubEvent::Left {
            peer_id: "a".to_string(),
        })
        .await;
        assert_eq!(hub.subscriber_count().await, 1);

        hub.publish(&HubEvent::Left {
            peer_id: "b".to_string(),
        })
        .await;

        // live subscriber sees snapshot + both events, in publish order
        let frames: Vec<Value> = [
            live_rx.recv().await.unwrap(),
            live_rx.recv().await.unwrap(),
            live_rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect();
        assert_eq!(frames[0]["kind"], "snapshot");
        assert_eq!(frames[1]["peerId"], "a");
        assert_eq!(frames[2]["peerId"], "b");
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = DashboardHub::new();
        let registry = PeerSessionRegistry::new();
        let (id, _rx) = hub.subscribe(&registry).await;
        hub.unsubscribe(id).await;
        hub.unsubscribe(id).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_drain_clears_all_and_closes_receivers() {
        let hub = DashboardHub::new();
        let registry = PeerSessionRegistry::new();
        let (_, mut rx1) = hub.subscribe(&registry).await;
        let (_, mut rx2) = hub.subscribe(&registry).await;
        hub.drain().await;
        assert_eq!(hub.subscriber_count().await, 0);

        // drain the queued snapshots, then the channels are closed
        assert!(rx1.recv().await.is_some());
        assert!(rx1.recv().await.is_none());
        assert!(rx2.recv().await.is_some());
        assert!(rx2.recv().await.is_none());
    }
}
