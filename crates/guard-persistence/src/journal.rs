//! Durable repository: in-memory queries plus an append-only JSON Lines
//! journal of every decision and alert.
//!
//! Files: `decisions_YYYY-MM-DD.jsonl` and `alerts_YYYY-MM-DD.jsonl`.
//! Every record reaches the in-memory store even when the journal write
//! fails; the journal error is still returned to the caller.

use crate::error::PersistenceResult;
use crate::memory::InMemoryGuardRepository;
use crate::repository::{AlertRecord, DailyGuardStats, GuardRepository};
use crate::writer::JsonLinesWriter;
use chrono::NaiveDate;
use guard_core::{BlockCategory, BlockReason, Clock, GuardDecisionOutput};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct JournalRepository {
    memory: InMemoryGuardRepository,
    decisions: Mutex<JsonLinesWriter<GuardDecisionOutput>>,
    alerts: Mutex<JsonLinesWriter<AlertRecord>>,
}

impl JournalRepository {
    /// Open (or create) the journal under `dir`.
    ///
    /// `buffer_size` records are held per file before a flush; 1 writes
    /// every record through immediately.
    pub fn open(
        dir: impl AsRef<Path>,
        buffer_size: usize,
        clock: Arc<dyn Clock>,
    ) -> PersistenceResult<Self> {
        let dir = dir.as_ref();
        let decisions = JsonLinesWriter::new(dir, "decisions", buffer_size, clock.clone())?;
        let alerts = JsonLinesWriter::new(dir, "alerts", buffer_size, clock.clone())?;
        info!(dir = %dir.display(), buffer_size, "Opened guard journal");

        Ok(Self {
            memory: InMemoryGuardRepository::new(clock),
            decisions: Mutex::new(decisions),
            alerts: Mutex::new(alerts),
        })
    }

    /// Flush both journal files.
    pub fn flush(&self) -> PersistenceResult<()> {
        self.decisions.lock().flush()?;
        self.alerts.lock().flush()
    }
}

impl GuardRepository for JournalRepository {
    fn log_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()> {
        let journaled = self.decisions.lock().add_record(output.clone());
        self.memory.log_decision(output)?;
        journaled
    }

    fn get_decision_by_evaluation_id(
        &self,
        evaluation_id: &str,
    ) -> PersistenceResult<Option<GuardDecisionOutput>> {
        self.memory.get_decision_by_evaluation_id(evaluation_id)
    }

    fn get_decisions_by_request_id(
        &self,
        request_id: &str,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>> {
        self.memory.get_decisions_by_request_id(request_id)
    }

    fn get_recent_blocks(
        &self,
        hours: u32,
        limit: usize,
        category: Option<BlockCategory>,
    ) -> PersistenceResult<Vec<GuardDecisionOutput>> {
        self.memory.get_recent_blocks(hours, limit, category)
    }

    fn get_block_count_by_reason(
        &self,
        hours: u32,
    ) -> PersistenceResult<BTreeMap<BlockReason, u64>> {
        self.memory.get_block_count_by_reason(hours)
    }

    fn log_alert(&self, alert: &AlertRecord) -> PersistenceResult<()> {
        let journaled = self.alerts.lock().add_record(alert.clone());
        self.memory.log_alert(alert)?;
        journaled
    }

    fn get_recent_alerts(&self, hours: u32, limit: usize) -> PersistenceResult<Vec<AlertRecord>> {
        self.memory.get_recent_alerts(hours, limit)
    }

    fn count_alerts_in_window(&self, minutes: u32) -> PersistenceResult<u64> {
        self.memory.count_alerts_in_window(minutes)
    }

    fn get_or_create_daily_stats(&self, date: NaiveDate) -> PersistenceResult<DailyGuardStats> {
        self.memory.get_or_create_daily_stats(date)
    }

    fn update_stats_for_decision(&self, output: &GuardDecisionOutput) -> PersistenceResult<()> {
        self.memory.update_stats_for_decision(output)
    }

    fn get_stats_range(&self, days: u32) -> PersistenceResult<Vec<DailyGuardStats>> {
        self.memory.get_stats_range(days)
    }

    /// Prunes the in-memory view only; journal files are kept for audit.
    fn cleanup_old_records(&self, retention_days: u32) -> PersistenceResult<usize> {
        self.memory.cleanup_old_records(retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guard_core::{BlockSeverity, Details, ManualClock, ValidationResult};
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        ))
    }

    fn lines(path: std::path::PathBuf) -> Vec<String> {
        let file = std::fs::File::open(path).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    #[test]
    fn test_decisions_and_alerts_are_journaled() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let repo = JournalRepository::open(dir.path(), 1, clock.clone()).unwrap();

        let failure = ValidationResult::block(
            "RuleValidator",
            BlockReason::RvSystemHaltState,
            None,
            Details::new(),
            0.1,
        );
        let output = GuardDecisionOutput::block(
            "GUARD-1".to_string(),
            None,
            &failure,
            vec![failure.clone()],
            0.4,
            clock.now(),
        );
        repo.log_decision(&output).unwrap();

        let mut alert = AlertRecord::new(
            "GUARD-1",
            "TRADE_BLOCKED",
            BlockSeverity::Critical,
            "TRADE BLOCKED [CRITICAL]",
            "System is halted",
            clock.now(),
        );
        alert.sent = true;
        repo.log_alert(&alert).unwrap();

        let decisions = lines(dir.path().join("decisions_2024-05-01.jsonl"));
        assert_eq!(decisions.len(), 1);
        let restored: GuardDecisionOutput = serde_json::from_str(&decisions[0]).unwrap();
        assert_eq!(restored, output);

        let alerts = lines(dir.path().join("alerts_2024-05-01.jsonl"));
        let restored: AlertRecord = serde_json::from_str(&alerts[0]).unwrap();
        assert_eq!(restored.id, alert.id);

        // The in-memory view answers queries.
        assert!(repo.get_decision_by_evaluation_id("GUARD-1").unwrap().is_some());
        assert_eq!(repo.count_alerts_in_window(5).unwrap(), 1);
    }

    #[test]
    fn test_buffered_journal_flushes_on_demand() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let repo = JournalRepository::open(dir.path(), 50, clock.clone()).unwrap();
        let output =
            GuardDecisionOutput::execute("GUARD-2".to_string(), None, Vec::new(), 0.2, clock.now());
        repo.log_decision(&output).unwrap();
        assert!(!dir.path().join("decisions_2024-05-01.jsonl").exists());

        repo.flush().unwrap();
        assert_eq!(lines(dir.path().join("decisions_2024-05-01.jsonl")).len(), 1);
    }

    #[test]
    fn test_journal_failure_keeps_memory_and_drops_the_line() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("journal");
        let clock = clock();
        let repo = JournalRepository::open(&dir, 1, clock.clone()).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let first =
            GuardDecisionOutput::execute("GUARD-A".to_string(), None, Vec::new(), 0.2, clock.now());
        assert!(repo.log_decision(&first).is_err());
        assert!(repo.get_decision_by_evaluation_id("GUARD-A").unwrap().is_some());

        std::fs::create_dir_all(&dir).unwrap();
        let second =
            GuardDecisionOutput::execute("GUARD-B".to_string(), None, Vec::new(), 0.2, clock.now());
        repo.log_decision(&second).unwrap();

        let decisions = lines(dir.join("decisions_2024-05-01.jsonl"));
        assert_eq!(decisions.len(), 1);
        let restored: GuardDecisionOutput = serde_json::from_str(&decisions[0]).unwrap();
        assert_eq!(restored.evaluation_id(), "GUARD-B");
    }
}
