//! Per-source circuit breakers and the shared per-call deadline.
//!
//! Breakers are process-lifetime state: a classified rate-limit or forbidden
//! failure trips a source permanently until an explicit `reset()`. There is
//! no automatic expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::{CircuitState, SourceId, TripReason};

/// Thread-safe breaker flags for all upstream sources
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    tripped: Mutex<HashMap<SourceId, TripReason>>,
}

impl CircuitBreakers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether requests to this source are currently allowed
    pub fn is_open(&self, source: SourceId) -> bool {
        let tripped = self.tripped.lock().expect("breaker lock not poisoned");
        !tripped.contains_key(&source)
    }

    /// Trip a source. Concurrent trips from different tasks are safe;
    /// the first recorded reason wins.
    pub fn trip(&self, source: SourceId, reason: TripReason) {
        let mut tripped = self.tripped.lock().expect("breaker lock not poisoned");
        tripped.entry(source).or_insert(reason);
    }

    /// Clear all breakers. Operator-explicit only, never called by the engine.
    pub fn reset(&self) {
        let mut tripped = self.tripped.lock().expect("breaker lock not poisoned");
        tripped.clear();
    }

    /// Snapshot of every source's breaker for status reporting
    pub fn snapshot(&self) -> Vec<CircuitState> {
        let tripped = self.tripped.lock().expect("breaker lock not poisoned");
        [SourceId::Historical, SourceId::Twitter, SourceId::Reddit]
            .iter()
            .map(|&source| {
                let reason = tripped.get(&source).copied();
                CircuitState {
                    source,
                    tripped: reason.is_some(),
                    trip_reason: reason,
                }
            })
            .collect()
    }
}

/// Absolute time budget shared by every source attempt within one call
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// Time left in the budget; zero once expired
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }
}
