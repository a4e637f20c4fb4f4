//! # Exponential Backoff
//!
//! Per-key retry delays for the reconcile queues. A key that keeps failing waits
//! `base * 2^failures`, capped at `max`; a successful reconcile forgets the key and the
//! next failure starts over at `base`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `base` and never exceeding `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay after `failures` previous failures (stateless)
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        // 2^31 already overflows any sane base, stop doubling well before that
        let factor = 1u32.checked_shl(failures.min(31)).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

/// Failure counts per key
#[derive(Debug, Clone)]
pub struct ItemBackoff<K> {
    backoff: ExponentialBackoff,
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> ItemBackoff<K> {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff,
            failures: HashMap::new(),
        }
    }

    /// Delay before retrying `key`, counting one more failure
    pub fn next_delay(&mut self, key: &K) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let delay = self.backoff.delay(*failures);
        *failures = failures.saturating_add(1);
        delay
    }

    /// Reset the history of `key`
    pub fn forget(&mut self, key: &K) {
        self.failures.remove(key);
    }

    /// How many times `key` has been requeued since it was last forgotten
    pub fn failures(&self, key: &K) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }
}
