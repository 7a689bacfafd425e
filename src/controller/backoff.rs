//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations. The sequence grows more slowly than
//! exponential backoff, which suits Key Vault issuance that can legitimately stay
//! pending for minutes.
//!
//! With the defaults (5s min, 300s max): 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s.
//!
//! ```rust
//! use azure_keyvault_issuer::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(5, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! ```

use crate::controller::store::ObjectKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Current delay in seconds; advances the sequence, capped at the maximum
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

/// Independent backoff sequences per object
#[derive(Debug)]
pub struct BackoffStates {
    min_secs: u64,
    max_secs: u64,
    states: Mutex<HashMap<ObjectKey, (FibonacciBackoff, u32)>>,
}

impl BackoffStates {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next delay for `key` and how many consecutive errors it has seen
    pub fn next_delay(&self, key: &ObjectKey) -> (Duration, u32) {
        let Ok(mut states) = self.states.lock() else {
            return (Duration::from_secs(self.min_secs), 0);
        };
        let (backoff, errors) = states
            .entry(key.clone())
            .or_insert_with(|| (FibonacciBackoff::new(self.min_secs, self.max_secs), 0));
        *errors += 1;
        (backoff.next_backoff(), *errors)
    }

    /// Forget `key` after a successful reconciliation
    pub fn reset(&self, key: &ObjectKey) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}
