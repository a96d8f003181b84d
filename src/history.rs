//! Sensor History Store
//!
//! Bounded per-key buffers of recent values and refined risks. Each
//! `(machine_id, sensor_type)` key owns one `SensorHistory` behind its own
//! mutex; the map shard lock is only held long enough to find or create that
//! entry, so different keys never contend on a predict call.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::types::SensorKey;

// ============================================================================
// Per-key History
// ============================================================================

/// Last `capacity` values and last `capacity` refined risks for one key.
#[derive(Debug, Clone)]
pub struct SensorHistory {
    values: VecDeque<f64>,
    risks: VecDeque<f64>,
    capacity: usize,
    last_seen: Instant,
}

impl SensorHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            risks: VecDeque::with_capacity(capacity),
            capacity,
            last_seen: Instant::now(),
        }
    }

    /// Append a value, evicting the oldest when full.
    pub fn push_value(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.last_seen = Instant::now();
    }

    /// Append a refined risk, evicting the oldest when full.
    pub fn push_risk(&mut self, risk: f64) {
        if self.risks.len() >= self.capacity {
            self.risks.pop_front();
        }
        self.risks.push_back(risk);
    }

    /// Values oldest first
    pub fn values(&self) -> &VecDeque<f64> {
        &self.values
    }

    /// Refined risks oldest first
    pub fn risks(&self) -> &VecDeque<f64> {
        &self.risks
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Concurrent map of per-key histories.
#[derive(Debug)]
pub struct HistoryStore {
    entries: DashMap<SensorKey, Arc<Mutex<SensorHistory>>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Per-key history handle, created empty on first use.
    pub fn entry(&self, key: &SensorKey) -> Arc<Mutex<SensorHistory>> {
        if let Some(existing) = self.entries.get(key) {
            return Arc::clone(existing.value());
        }
        let capacity = self.capacity;
        Arc::clone(
            self.entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(SensorHistory::new(capacity))))
                .value(),
        )
    }

    /// Snapshot of one key's history, if it exists.
    pub fn snapshot(&self, key: &SensorKey) -> Option<SensorHistory> {
        let handle = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
        let history = lock(&handle).clone();
        Some(history)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop histories that have not received a value for `ttl`.
    ///
    /// A key whose handle is held outside the map (a predict call between
    /// `entry` and its push) is kept; handles are only cloned under the shard
    /// lock that `retain` holds, so the count cannot change mid-check.
    ///
    /// Returns the number of keys removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_key, history| {
            Arc::strong_count(history) > 1 || lock(history).idle_for(now) < ttl
        });
        before.saturating_sub(self.entries.len())
    }
}

/// Lock a per-key history. A panic in another predict call cannot leave the
/// buffers half-written, so a poisoned lock is recovered.
pub(crate) fn lock(history: &Mutex<SensorHistory>) -> MutexGuard<'_, SensorHistory> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
