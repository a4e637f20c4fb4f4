//! Rate-limited work queue
//!
//! A deduplicating mailbox of object keys drained by one worker. A key queued several
//! times before it is picked up is processed once; a key added while it is being
//! processed is held back until the worker calls [`WorkQueue::done`], so the same key is
//! never reconciled twice concurrently. Forgetting a key cancels its pending delayed
//! re-adds.

use crate::backoff::{ExponentialBackoff, ItemBackoff};
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to a work queue
#[derive(Debug)]
pub struct WorkQueue<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[derive(Debug)]
struct Shared<K> {
    state: Mutex<State<K>>,
    notify: Notify,
}

#[derive(Debug)]
struct State<K> {
    queue: VecDeque<K>,
    /// Keys waiting in `queue` or re-added while processing
    dirty: HashSet<K>,
    processing: HashSet<K>,
    /// Delayed re-adds still sleeping, by key
    timers: HashMap<K, HashSet<u64>>,
    next_timer: u64,
    backoff: ItemBackoff<K>,
    shutting_down: bool,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    /// Create an empty queue retrying failed keys with `backoff`
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    timers: HashMap::new(),
                    next_timer: 0,
                    backoff: ItemBackoff::new(backoff),
                    shutting_down: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<K>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `key` unless it is already waiting
    pub fn add(&self, key: K) {
        let mut state = self.state();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Queue `key` once `delay` has elapsed, unless it is forgotten first
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let timer = {
            let mut state = self.state();
            if state.shutting_down {
                return;
            }
            let timer = state.next_timer;
            state.next_timer = state.next_timer.wrapping_add(1);
            state.timers.entry(key.clone()).or_default().insert(timer);
            timer
        };
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.take_timer(&key, timer) {
                queue.add(key);
            }
        });
    }

    /// Whether `timer` for `key` was still armed
    fn take_timer(&self, key: &K, timer: u64) -> bool {
        let mut state = self.state();
        let Some(timers) = state.timers.get_mut(key) else {
            return false;
        };
        let armed = timers.remove(&timer);
        if timers.is_empty() {
            state.timers.remove(key);
        }
        armed
    }

    /// Queue `key` after its backoff delay, counting one more failure
    pub fn add_rate_limited(&self, key: K) {
        let delay = self.state().backoff.next_delay(&key);
        self.add_after(key, delay);
    }

    /// Clear the backoff history of `key` and drop its pending delayed re-adds
    pub fn forget(&self, key: &K) {
        let mut state = self.state();
        state.backoff.forget(key);
        state.timers.remove(key);
    }

    /// Failures recorded for `key` since it was last forgotten
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.state().backoff.failures(key)
    }

    /// Wait for the next key
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` as processed, requeueing it if it was added in the meantime
    pub fn done(&self, key: &K) {
        let mut state = self.state();
        if state.processing.remove(key) && state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.shared.notify.notify_waiters();
        self.shared.notify.notify_one();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// Number of keys ready to be processed
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn queue() -> WorkQueue<&'static str> {
        WorkQueue::new(ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(8)))
    }

    #[tokio::test]
    async fn test_duplicate_adds_collapse() {
        let queue = queue();
        queue.add("a");
        queue.add("b");
        queue.add("a");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.get().await, Some("a"));
        assert_eq!(queue.get().await, Some("b"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_add_while_processing_is_deferred() {
        let queue = queue();
        queue.add("a");
        assert_eq!(queue.get().await, Some("a"));

        queue.add("a");
        queue.add("a");
        assert!(queue.is_empty());

        queue.done(&"a");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await, Some("a"));
        queue.done(&"a");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_done_on_waiting_key_does_not_duplicate() {
        let queue = queue();
        queue.add("a");
        queue.done(&"a");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = queue();
        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.add("a");
        assert_eq!(worker.await.unwrap(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_add_waits_for_backoff() {
        let queue = queue();
        let start = Instant::now();

        queue.add_rate_limited("a");
        assert!(queue.is_empty());
        assert_eq!(queue.get().await, Some("a"));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(2));
        queue.done(&"a");

        queue.add_rate_limited("a");
        assert_eq!(queue.get().await, Some("a"));
        // Second failure doubles the delay
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(queue.num_requeues(&"a"), 2);
        queue.done(&"a");

        queue.forget(&"a");
        assert_eq!(queue.num_requeues(&"a"), 0);
        queue.add_rate_limited("a");
        assert_eq!(queue.get().await, Some("a"));
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_cancels_delayed_add() {
        let queue = queue();
        queue.add_rate_limited("a");
        queue.add_after("b", Duration::from_secs(1));
        queue.forget(&"a");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await, Some("b"));
        queue.done(&"b");

        // Timers armed after the forget still fire
        queue.add_rate_limited("a");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(queue.get().await, Some("a"));
    }

    #[tokio::test]
    async fn test_shut_down_wakes_worker() {
        let queue = queue();
        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.shut_down();
        assert_eq!(worker.await.unwrap(), None);

        queue.add("a");
        assert!(queue.is_empty());
        assert_eq!(queue.get().await, None);
    }
}
