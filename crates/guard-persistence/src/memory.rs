//! In-process repository.
//!
//! Decisions and alerts are kept in append order; queries scan newest first.
//! Suitable for a single process and for tests. Durable storage is layered
//! on top by `JournalRepository`.

use crate::error::PersistenceResult;
use crate::repository::{AlertRecord, DailyGuardStats, GuardRepository};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use guard_core::{BlockCategory, BlockReason, Clock, GuardDecisionOutput};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct Store {
    decisions: Vec<GuardDecisionOutput>,
    alerts: Vec<AlertRecord>,
    stats: BTreeMap<NaiveDate, DailyGuardStats>,
}

pub struct InMemoryGuardRepository {
    clock: Arc<dyn Clock>,
    store: RwLock<Store>,
}

impl InMemoryGuardRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            store: RwLock::new(Store::default()),
        }
    }

    /// `now - span`, or the earliest representable instant.
    fn cutoff(&self, span: Duration) -> DateTime<Utc> {
        self.clock
            .now()
            .checked_sub_signed(span)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn cutoff_hours(&self, hours: u32) -> DateTime<Utc> {
        self.cutoff(Duration::hours(i64::from(hours)))
    }

    /// Number of stored decisions.
    pub fn decision_count(&self) -> usize {
        self.store.read().decisions.len()
    }

    /// Number of stored alerts.
    pub fn alert_count(&self) -> usize {
        self.store.read().alerts.len()
    }
}

impl GuardRepository for InMemoryGuardRepository {
    fn log_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()> {
        self.store.write().decisions.push(output.clone());
        Ok(())
    }

    fn get_decision_by_evaluation_id(
        &self,
        evaluation_id: &str,
    ) -> PersistenceResult<Option<GuardDecisionOutput>> {
        Ok(self
            .store
            .read()
            .decisions
            .iter()
            .rev()
            .find(|d| d.evaluation_id() == evaluation_id)
            .cloned())
    }

    fn get_decisions_by_request_id(
        &self,
        request_id: &str,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>> {
        Ok(self
            .store
            .read()
            .decisions
            .iter()
            .rev()
            .filter(|d| d.request_id() == Some(request_id))
            .cloned()
            .collect())
    }

    fn get_recent_blocks(
        &self,
        hours: u32,
        limit: usize,
        category: Option<BlockCategory>,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>> {
        let cutoff = self.cutoff_hours(hours);
        Ok(self
            .store
            .read()
            .decisions
            .iter()
            .rev()
            .filter(|d| d.is_block() && d.timestamp() >= cutoff)
            .filter(|d| category.map_or(true, |c| d.category() == Some(c)))
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_block_count_by_reason(
        &self,
        hours: u32,
    ) -> PersistenceResult<BTreeMap<BlockReason, u64>> {
        let cutoff = self.cutoff_hours(hours);
        let mut counts = BTreeMap::new();
        for decision in &self.store.read().decisions {
            if decision.timestamp() < cutoff {
                continue;
            }
            if let Some(reason) = decision.reason() {
                *counts.entry(reason).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn log_alert(&self, alert: &AlertRecord) -> PersistenceResult<()> {
        let mut store = self.store.write();
        store
            .stats
            .entry(alert.created_at.date_naive())
            .or_insert_with(|| DailyGuardStats::new(alert.created_at.date_naive()))
            .record_alert(alert);
        store.alerts.push(alert.clone());
        Ok(())
    }

    fn get_recent_alerts(&self, hours: u32, limit: usize) -> PersistenceResult<Vec<AlertRecord>> {
        let cutoff = self.cutoff_hours(hours);
        Ok(self
            .store
            .read()
            .alerts
            .iter()
            .rev()
            .filter(|a| a.created_at >= cutoff)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_alerts_in_window(&self, minutes: u32) -> PersistenceResult<u64> {
        let cutoff = self.cutoff(Duration::minutes(i64::from(minutes)));
        let count = self
            .store
            .read()
            .alerts
            .iter()
            .filter(|a| a.sent && a.created_at >= cutoff)
            .count();
        Ok(count as u64)
    }

    fn get_or_create_daily_stats(&self, date: NaiveDate) -> PersistenceResult<DailyGuardStats> {
        let mut store = self.store.write();
        Ok(store
            .stats
            .entry(date)
            .or_insert_with(|| DailyGuardStats::new(date))
            .clone())
    }

    fn update_stats_for_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()> {
        let date = output.timestamp().date_naive();
        self.store
            .write()
            .stats
            .entry(date)
            .or_insert_with(|| DailyGuardStats::new(date))
            .record_decision(output);
        Ok(())
    }

    fn get_stats_range(&self, days: u32) -> PersistenceResult<Vec<DailyGuardStats>> {
        let today = self.clock.now().date_naive();
        let first = today
            .checked_sub_signed(Duration::days(i64::from(days.saturating_sub(1))))
            .unwrap_or(NaiveDate::MIN);
        Ok(self
            .store
            .read()
            .stats
            .range(first..=today)
            .map(|(_, stats)| stats.clone())
            .collect())
    }

    fn cleanup_old_records(&self, retention_days: u32) -> PersistenceResult<usize> {
        let cutoff = self.cutoff(Duration::days(i64::from(retention_days)));
        let cutoff_date = cutoff.date_naive();

        let mut store = self.store.write();
        let before = store.decisions.len() + store.alerts.len() + store.stats.len();
        store.decisions.retain(|d| d.timestamp() >= cutoff);
        store.alerts.retain(|a| a.created_at >= cutoff);
        store.stats.retain(|date, _| *date >= cutoff_date);
        let after = store.decisions.len() + store.alerts.len() + store.stats.len();

        Ok(before - after)
    }
}
