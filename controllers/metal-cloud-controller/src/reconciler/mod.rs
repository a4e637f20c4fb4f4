//! Queue-driven reconcilers
//!
//! Watch events arrive as [`ResourceEvent`] messages and are funneled into a
//! [`WorkQueue`] keyed by object identity. A single worker drains the queue one key at a
//! time; failures are retried with per-key exponential backoff.
//!
//! - `node`: maintenance approval and pod address blocks (workload cluster Nodes)
//! - `server_claim`: maintenance-needed mirroring (metal cluster ServerClaims)

pub mod node;
pub mod server_claim;
#[cfg(test)]
mod server_claim_test;

pub use node::NodeReconciler;
pub use server_claim::ServerClaimReconciler;

use crate::backoff::ExponentialBackoff;
use crate::error::ProviderError;
use crate::workqueue::WorkQueue;
use metal_client::ObjectKey;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A change observed on a watched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    Added(ObjectKey),
    Updated(ObjectKey),
    Deleted(ObjectKey),
}

/// Reconciliation of one resource kind, one key at a time
#[async_trait::async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Resource kind, for logs
    fn kind(&self) -> &'static str;

    /// Bring the object behind `key` to its desired state
    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ProviderError>;
}

/// Run `reconciler` over `events` until `cancel` fires or the event source closes
///
/// Returns once the in-flight reconcile, if any, has finished.
pub async fn run<R: Reconcile>(
    reconciler: Arc<R>,
    mut events: UnboundedReceiver<ResourceEvent>,
    backoff: ExponentialBackoff,
    cancel: CancellationToken,
) {
    let kind = reconciler.kind();
    let queue = WorkQueue::new(backoff);
    info!("Starting {} reconciler", kind);

    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move {
            while let Some(key) = queue.get().await {
                process(reconciler.as_ref(), &queue, key).await;
            }
        })
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(ResourceEvent::Added(key)) | Some(ResourceEvent::Updated(key)) => queue.add(key),
                Some(ResourceEvent::Deleted(key)) => {
                    debug!("{} {} deleted", kind, key);
                    queue.forget(&key);
                    queue.done(&key);
                }
                None => {
                    info!("Event source for {} reconciler closed", kind);
                    break;
                }
            },
        }
    }

    info!("Stopping {} reconciler", kind);
    queue.shut_down();
    if let Err(e) = worker.await {
        error!("{} reconciler worker failed: {}", kind, e);
    }
}

async fn process<R: Reconcile + ?Sized>(reconciler: &R, queue: &WorkQueue<ObjectKey>, key: ObjectKey) {
    let kind = reconciler.kind();
    match reconciler.reconcile(&key).await {
        Ok(()) => queue.forget(&key),
        Err(e) if e.is_retryable() => {
            error!(
                "Failed to reconcile {} {} (attempt {}): {}",
                kind,
                key,
                queue.num_requeues(&key) + 1,
                e
            );
            queue.add_rate_limited(key.clone());
        }
        Err(e) => {
            error!("Failed to reconcile {} {}, not retrying: {}", kind, key, e);
            queue.forget(&key);
        }
    }
    queue.done(&key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    /// Records every reconcile and fails keys as scripted
    struct Recorder {
        calls: Mutex<Vec<ObjectKey>>,
        failures: Mutex<HashMap<ObjectKey, VecDeque<ProviderError>>>,
        seen: mpsc::UnboundedSender<ObjectKey>,
    }

    impl Recorder {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ObjectKey>) {
            let (seen, rx) = mpsc::unbounded_channel();
            let recorder = Self {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                seen,
            };
            (Arc::new(recorder), rx)
        }

        fn fail_next(&self, key: &ObjectKey, error: ProviderError) {
            self.failures.lock().unwrap().entry(key.clone()).or_default().push_back(error);
        }

        fn calls(&self) -> Vec<ObjectKey> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Reconcile for Recorder {
        fn kind(&self) -> &'static str {
            "Test"
        }

        async fn reconcile(&self, key: &ObjectKey) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(key.clone());
            self.seen.send(key.clone()).unwrap();
            match self.failures.lock().unwrap().get_mut(key).and_then(VecDeque::pop_front) {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::cluster(name)
    }

    fn backoff() -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconcile_is_retried_with_backoff() {
        let (recorder, mut seen) = Recorder::new();
        recorder.fail_next(&key("a"), ProviderError::Watch("transient".to_string()));
        recorder.fail_next(&key("a"), ProviderError::Watch("transient".to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(recorder.clone(), rx, backoff(), cancel.clone()));

        let start = Instant::now();
        tx.send(ResourceEvent::Added(key("a"))).unwrap();
        assert_eq!(seen.recv().await, Some(key("a")));
        assert_eq!(seen.recv().await, Some(key("a")));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(seen.recv().await, Some(key("a")));
        // 1s then 2s
        assert!(start.elapsed() >= Duration::from_secs(3));

        // Success clears the history, the next failure starts over at the base delay
        recorder.fail_next(&key("a"), ProviderError::Watch("transient".to_string()));
        let restart = Instant::now();
        tx.send(ResourceEvent::Updated(key("a"))).unwrap();
        assert_eq!(seen.recv().await, Some(key("a")));
        assert_eq!(seen.recv().await, Some(key("a")));
        assert!(restart.elapsed() < Duration::from_secs(2));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_input_is_not_retried() {
        let (recorder, mut seen) = Recorder::new();
        recorder.fail_next(&key("bad"), ProviderError::InvalidProviderId("aws://x".to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(recorder.clone(), rx, backoff(), cancel.clone()));

        tx.send(ResourceEvent::Added(key("bad"))).unwrap();
        assert_eq!(seen.recv().await, Some(key("bad")));
        tokio::time::sleep(Duration::from_secs(120)).await;

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(recorder.calls(), vec![key("bad")]);
    }

    #[tokio::test]
    async fn test_deleted_objects_are_not_reconciled() {
        let (recorder, mut seen) = Recorder::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(recorder.clone(), rx, backoff(), cancel.clone()));

        tx.send(ResourceEvent::Deleted(key("gone"))).unwrap();
        tx.send(ResourceEvent::Added(key("b"))).unwrap();
        assert_eq!(seen.recv().await, Some(key("b")));

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(recorder.calls(), vec![key("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_pending_retry() {
        let (recorder, mut seen) = Recorder::new();
        recorder.fail_next(&key("a"), ProviderError::Watch("transient".to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(recorder.clone(), rx, backoff(), cancel.clone()));

        tx.send(ResourceEvent::Added(key("a"))).unwrap();
        assert_eq!(seen.recv().await, Some(key("a")));
        tx.send(ResourceEvent::Deleted(key("a"))).unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(recorder.calls(), vec![key("a")]);
    }

    #[tokio::test]
    async fn test_stops_when_event_source_closes() {
        let (recorder, _seen) = Recorder::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(recorder.clone(), rx, backoff(), CancellationToken::new()));

        drop(tx);
        handle.await.unwrap();
        assert!(recorder.calls().is_empty());
    }
}
