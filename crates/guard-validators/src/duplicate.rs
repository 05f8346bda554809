//! Rolling-window cache of recently seen request ids.
//!
//! The only state shared across evaluations. Entries are kept in insertion
//! order so eviction pops from the front and touches only expired entries.
//!
//! Thread-safe: a single `parking_lot::Mutex` serializes lookup, eviction
//! and insertion.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

#[derive(Default)]
struct CacheState {
    /// (request_id, first_seen) in insertion order.
    order: VecDeque<(String, DateTime<Utc>)>,
    seen: HashMap<String, DateTime<Utc>>,
}

/// Time-windowed set of request ids.
pub struct DuplicateRequestCache {
    window: Duration,
    state: Mutex<CacheState>,
}

impl DuplicateRequestCache {
    /// Windows beyond what `chrono::Duration` can hold are clamped.
    #[must_use]
    pub fn new(window_seconds: u64) -> Self {
        let window_seconds = i64::try_from(window_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Self {
            window: Duration::seconds(window_seconds),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Evict expired entries, then record `request_id`.
    ///
    /// Returns `Err(first_seen)` if the id is still inside the window; the
    /// original timestamp is kept, so a replay does not extend the window.
    pub fn check_and_record(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DateTime<Utc>> {
        let mut state = self.state.lock();
        Self::evict_expired(&mut state, now, self.window);

        if let Some(first_seen) = state.seen.get(request_id) {
            return Err(*first_seen);
        }

        state.seen.insert(request_id.to_string(), now);
        state.order.push_back((request_id.to_string(), now));
        Ok(())
    }

    /// Entries whose age is strictly greater than the window are removed.
    fn evict_expired(state: &mut CacheState, now: DateTime<Utc>, window: Duration) {
        let mut evicted = 0usize;
        while let Some((_, seen_at)) = state.order.front() {
            if now - *seen_at <= window {
                break;
            }
            if let Some((id, _)) = state.order.pop_front() {
                state.seen.remove(&id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            trace!(evicted, remaining = state.order.len(), "duplicate cache evicted");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn window_seconds(&self) -> i64 {
        self.window.num_seconds()
    }

    /// Forget every id.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.seen.clear();
    }
}

impl std::fmt::Debug for DuplicateRequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateRequestCache")
            .field("window_seconds", &self.window.num_seconds())
            .field("entries", &self.len())
            .finish()
    }
}
