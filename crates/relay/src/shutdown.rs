//! Tracked background work.
//!
//! Every asynchronously spawned unit of work (peer event loops, event
//! deliveries, removals) is registered here at creation and deregistered
//! on completion, so shutdown can cancel and join all of it
//! deterministically instead of leaking fire-and-forget tasks.

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Process-wide tracked task set with a cancellation token.
///
/// Created empty at startup, drained exactly once at shutdown.
pub struct TaskGroup {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn a tracked task.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(future)
    }

    /// Resolves when shutdown has been requested. Cancelled work must exit
    /// cleanly; cancellation is not an error.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tasks still tracked (spawned and not yet terminal).
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Request cancellation of every tracked task and wait until all of
    /// them reach a terminal state.
    pub async fn drain(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("task group drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Peer;
    use crate::testutil::MockTransport;
    use crate::{RelayApp, RelayConfig};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_completed_tasks_deregister() {
        let group = TaskGroup::new();
        let handle = group.spawn(async { 2 + 2 });
        assert_eq!(handle.await.unwrap(), 4);
        assert!(!group.is_cancelled());
        group.drain().await;
        assert_eq!(group.pending(), 0);
    }

    #[tokio::test]
    async fn test_cooperative_tasks_exit_on_cancel() {
        let group = Arc::new(TaskGroup::new());
        for _ in 0..4 {
            let g = Arc::clone(&group);
            group.spawn(async move {
                g.cancelled().await;
            });
        }
        group.drain().await;
        assert_eq!(group.pending(), 0);
    }

    // Shutdown scenario: N active peers, M subscribers, K in-flight tasks.
    #[tokio::test]
    async fn test_shutdown_drains_everything() {
        let app = RelayApp::new(RelayConfig::default()).unwrap();

        let transports: Vec<Arc<MockTransport>> =
            (0..3).map(|_| Arc::new(MockTransport::new())).collect();
        for (i, transport) in transports.iter().enumerate() {
            let peer = Peer::new(format!("peer-{i}"), None, transport.clone());
            app.registry.insert(peer).await.unwrap();
        }

        let mut receivers = Vec::new();
        for _ in 0..2 {
            let (_, rx) = app.hub.subscribe(&app.registry).await;
            receivers.push(rx);
        }

        for _ in 0..5 {
            let worker = Arc::clone(&app);
            app.tasks.spawn(async move {
                worker.tasks.cancelled().await;
            });
        }

        app.shutdown().await;

        assert!(app.registry.is_empty().await);
        assert_eq!(app.hub.subscriber_count().await, 0);
        assert_eq!(app.tasks.pending(), 0);
        assert!(transports.iter().all(|t| t.is_closed()));

        // subscriber channels are closed once the queued snapshot drains
        for mut rx in receivers {
            assert!(rx.recv().await.is_some());
            assert!(rx.recv().await.is_none());
        }

        // second shutdown is a no-op
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_swallows_transport_close_failures() {
        let app = RelayApp::new(RelayConfig::default()).unwrap();
        let transport = Arc::new(MockTransport::failing());
        app.registry
            .insert(Peer::new("p1".to_string(), None, transport.clone()))
            .await
            .unwrap();

        app.shutdown().await;
        assert!(app.registry.is_empty().await);
        assert!(transport.is_closed());
    }
}
