//! Repository boundary for decisions, alerts and daily statistics.

use crate::error::PersistenceResult;
use chrono::{DateTime, NaiveDate, Utc};
use guard_core::{BlockCategory, BlockReason, BlockSeverity, GuardDecisionOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A dispatched (or suppressed) alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub evaluation_id: String,
    /// e.g. `TRADE_BLOCKED`.
    pub alert_type: String,
    pub severity: BlockSeverity,
    pub title: String,
    pub message: String,
    pub sent: bool,
    pub send_error: Option<String>,
    pub rate_limited: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        evaluation_id: impl Into<String>,
        alert_type: impl Into<String>,
        severity: BlockSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            evaluation_id: evaluation_id.into(),
            alert_type: alert_type.into(),
            severity,
            title: title.into(),
            message: message.into(),
            sent: false,
            send_error: None,
            rate_limited: false,
            created_at,
        }
    }
}

/// Per-day aggregate of evaluations and alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyGuardStats {
    pub date: NaiveDate,
    pub total_evaluations: u64,
    pub execute_count: u64,
    pub block_count: u64,
    pub blocks_by_category: BTreeMap<BlockCategory, u64>,
    pub blocks_by_severity: BTreeMap<BlockSeverity, u64>,
    pub avg_evaluation_time_ms: f64,
    pub max_evaluation_time_ms: f64,
    pub alerts_sent: u64,
    pub alerts_rate_limited: u64,
}

impl DailyGuardStats {
    /// Empty stats with every category and severity present at zero.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_evaluations: 0,
            execute_count: 0,
            block_count: 0,
            blocks_by_category: BlockCategory::ALL.iter().map(|c| (*c, 0)).collect(),
            blocks_by_severity: BlockSeverity::ALL.iter().map(|s| (*s, 0)).collect(),
            avg_evaluation_time_ms: 0.0,
            max_evaluation_time_ms: 0.0,
            alerts_sent: 0,
            alerts_rate_limited: 0,
        }
    }

    /// Fold one decision into the aggregate.
    pub fn record_decision(&mut self, output: &GuardDecisionOutput) {
        self.total_evaluations += 1;
        if output.is_execute() {
            self.execute_count += 1;
        } else {
            self.block_count += 1;
            if let Some(category) = output.category() {
                *self.blocks_by_category.entry(category).or_insert(0) += 1;
            }
            if let Some(severity) = output.severity() {
                *self.blocks_by_severity.entry(severity).or_insert(0) += 1;
            }
        }

        let elapsed = output.evaluation_time_ms();
        let n = self.total_evaluations as f64;
        self.avg_evaluation_time_ms += (elapsed - self.avg_evaluation_time_ms) / n;
        if elapsed > self.max_evaluation_time_ms {
            self.max_evaluation_time_ms = elapsed;
        }
    }

    /// Fold one alert into the aggregate.
    pub fn record_alert(&mut self, alert: &AlertRecord) {
        if alert.sent {
            self.alerts_sent += 1;
        }
        if alert.rate_limited {
            self.alerts_rate_limited += 1;
        }
    }

    /// Blocks as a percentage of evaluations. 0 when nothing was evaluated.
    pub fn block_rate(&self) -> f64 {
        if self.total_evaluations == 0 {
            return 0.0;
        }
        self.block_count as f64 / self.total_evaluations as f64 * 100.0
    }
}

/// Storage for decisions, alerts and daily statistics.
///
/// Windowed queries (`hours`, `minutes`, `days`) are relative to the
/// implementation's clock. All lists are newest first unless noted.
pub trait GuardRepository: Send + Sync {
    fn log_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()>;

    fn get_decision_by_evaluation_id(
        &self,
        evaluation_id: &str,
    ) -> PersistenceResult<Option<GuardDecisionOutput>>;

    fn get_decisions_by_request_id(
        &self,
        request_id: &str,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>>;

    /// BLOCK decisions from the last `hours`, optionally filtered by category.
    fn get_recent_blocks(
        &self,
        hours: u32,
        limit: usize,
        category: Option<BlockCategory>,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>>;

    fn get_block_count_by_reason(&self, hours: u32)
        -> PersistenceResult<BTreeMap<BlockReason, u64>>;

    fn log_alert(&self, alert: &AlertRecord) -> PersistenceResult<()>;

    fn get_recent_alerts(&self, hours: u32, limit: usize) -> PersistenceResult<Vec<AlertRecord>>;

    /// Sent alerts in the last `minutes`.
    fn count_alerts_in_window(&self, minutes: u32) -> PersistenceResult<u64>;

    fn get_or_create_daily_stats(&self, date: NaiveDate) -> PersistenceResult<DailyGuardStats>;

    fn update_stats_for_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()>;

    /// Stats for the last `days` days including today, oldest first. Days
    /// with no activity are omitted.
    fn get_stats_range(&self, days: u32) -> PersistenceResult<Vec<DailyGuardStats>>;

    /// Delete records older than `retention_days`. Returns how many were removed.
    fn cleanup_old_records(&self, retention_days: u32) -> PersistenceResult<usize>;
}
