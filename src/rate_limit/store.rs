//! Per-tenant window counters.
//!
//! The limiter's admission logic only talks to [`CounterStore`]; the
//! in-process [`InMemoryCounterStore`] is the single-instance backend. A
//! shared external store for multi-instance deployments would implement the
//! same trait.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

/// Fixed-window counter for one tenant key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    /// Start of the current window, set by the first request in it.
    pub window_start: SystemTime,
    /// Requests counted in this window, admitted or not.
    pub count: u64,
}

impl RateLimitWindow {
    fn open(now: SystemTime) -> Self {
        Self { window_start: now, count: 0 }
    }

    /// Whether the window has rolled over at `now`.
    pub fn is_expired(&self, now: SystemTime, window: Duration) -> bool {
        match now.duration_since(self.window_start) {
            Ok(elapsed) => elapsed >= window,
            // Clock stepped backwards past the window start; keep the window.
            Err(_) => false,
        }
    }

    pub fn reset_time(&self, window: Duration) -> SystemTime {
        self.window_start + window
    }
}

/// View of a window as seen by one store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub window_start: SystemTime,
    /// Count before the operation (for `increment`) or current count (for `peek`).
    pub count: u64,
}

/// Storage behind the tenant rate limiter.
///
/// `increment` must be atomic per key: concurrent callers on the same key
/// must each observe a distinct pre-increment count.
pub trait CounterStore: Send + Sync {
    /// Count one request for `key`, opening a fresh window if the current
    /// one has expired. Returns the count *before* this request.
    fn increment(&self, key: &str, now: SystemTime, window: Duration) -> WindowSnapshot;

    /// Current window for `key`, if one is live. Never mutates.
    fn peek(&self, key: &str, now: SystemTime, window: Duration) -> Option<WindowSnapshot>;

    /// Drop windows that have expired at `now`. Returns how many were removed.
    fn evict_expired(&self, now: SystemTime, window: Duration) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, RateLimitWindow>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, key: &str, now: SystemTime, window: Duration) -> WindowSnapshot {
        // The entry guard holds this key's shard lock for the whole
        // read-modify-write.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateLimitWindow::open(now));

        if entry.is_expired(now, window) {
            *entry = RateLimitWindow::open(now);
        }

        let snapshot = WindowSnapshot {
            window_start: entry.window_start,
            count: entry.count,
        };
        entry.count = entry.count.saturating_add(1);
        snapshot
    }

    fn peek(&self, key: &str, now: SystemTime, window: Duration) -> Option<WindowSnapshot> {
        self.windows
            .get(key)
            .filter(|w| !w.is_expired(now, window))
            .map(|w| WindowSnapshot {
                window_start: w.window_start,
                count: w.count,
            })
    }

    fn evict_expired(&self, now: SystemTime, window: Duration) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now, window));
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}
