//! Alert rate limiting.
//!
//! Two limits apply: a minimum spacing between alerts for the same reason,
//! and a cap on alerts in any rolling hour.

use chrono::{DateTime, Duration, Utc};
use guard_core::BlockReason;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Why an alert was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitExceeded {
    /// Same reason alerted too recently.
    ReasonInterval { retry_after_seconds: i64 },
    /// Hourly cap reached.
    HourlyCap { max_per_hour: u32 },
}

#[derive(Default)]
struct LimiterState {
    last_by_reason: HashMap<BlockReason, DateTime<Utc>>,
    /// Timestamps of delivered alerts within the last hour.
    recent: VecDeque<DateTime<Utc>>,
}

pub struct AlertRateLimiter {
    min_interval: Duration,
    max_per_hour: u32,
    state: Mutex<LimiterState>,
}

/// Largest span `chrono::Duration::seconds` accepts.
const MAX_INTERVAL_SECONDS: i64 = i64::MAX / 1000;

impl AlertRateLimiter {
    pub fn new(min_interval_seconds: u64, max_per_hour: u32) -> Self {
        let min_interval_seconds = i64::try_from(min_interval_seconds)
            .unwrap_or(MAX_INTERVAL_SECONDS)
            .min(MAX_INTERVAL_SECONDS);
        Self {
            min_interval: Duration::seconds(min_interval_seconds),
            max_per_hour,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Drop timestamps that can no longer limit anything at `now`.
    ///
    /// The hourly window keeps one hour; per-reason entries are kept for
    /// the longer of one hour and the minimum interval.
    fn prune(&self, state: &mut LimiterState, now: DateTime<Utc>) {
        if let Some(hour_ago) = now.checked_sub_signed(Duration::hours(1)) {
            while state.recent.front().is_some_and(|&t| t <= hour_ago) {
                state.recent.pop_front();
            }
        }
        let retention = self.min_interval.max(Duration::hours(1));
        if let Some(cutoff) = now.checked_sub_signed(retention) {
            state.last_by_reason.retain(|_, last| *last > cutoff);
        }
    }

    /// Whether an alert for `reason` may be sent at `now`. Records nothing.
    pub fn check(&self, reason: BlockReason, now: DateTime<Utc>) -> Result<(), RateLimitExceeded> {
        let mut state = self.state.lock();
        self.prune(&mut state, now);

        if let Some(last) = state.last_by_reason.get(&reason) {
            let since = now - *last;
            if since < self.min_interval {
                return Err(RateLimitExceeded::ReasonInterval {
                    retry_after_seconds: (self.min_interval - since).num_seconds(),
                });
            }
        }

        if state.recent.len() >= self.max_per_hour as usize {
            warn!(
                count = state.recent.len(),
                max = self.max_per_hour,
                "Hourly alert cap reached"
            );
            return Err(RateLimitExceeded::HourlyCap {
                max_per_hour: self.max_per_hour,
            });
        }
        Ok(())
    }

    /// Count a delivered alert against both limits.
    pub fn record(&self, reason: BlockReason, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.last_by_reason.insert(reason, now);
        state.recent.push_back(now);
    }

    /// Alerts recorded within the last hour as of the latest check.
    pub fn recent_count(&self) -> usize {
        self.state.lock().recent.len()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_by_reason.clear();
        state.recent.clear();
    }
}
