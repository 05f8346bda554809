//! Evaluation followed by audit and alerting.
//!
//! Persistence and alert failures are logged and counted. They never change
//! the decision returned to the caller.

use crate::engine::TradeGuard;
use guard_alert::{format_alert, AlertOutcome, GuardAlerter, TRADE_BLOCKED};
use guard_core::{GuardDecisionOutput, GuardInput};
use guard_persistence::{AlertRecord, GuardRepository};
use guard_telemetry::Metrics;
use std::sync::Arc;
use tracing::error;

pub struct GuardPipeline {
    guard: Arc<TradeGuard>,
    repository: Option<Arc<dyn GuardRepository>>,
    alerter: Option<GuardAlerter>,
}

impl GuardPipeline {
    pub fn new(guard: Arc<TradeGuard>) -> Self {
        Self {
            guard,
            repository: None,
            alerter: None,
        }
    }

    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn GuardRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_alerter(mut self, alerter: GuardAlerter) -> Self {
        self.alerter = Some(alerter);
        self
    }

    pub fn guard(&self) -> &Arc<TradeGuard> {
        &self.guard
    }

    pub fn repository(&self) -> Option<&Arc<dyn GuardRepository>> {
        self.repository.as_ref()
    }

    /// Evaluate, record the decision, and alert on BLOCK.
    pub fn evaluate(&self, input: &GuardInput) -> GuardDecisionOutput {
        let output = self.guard.evaluate(input);
        self.persist(&output);
        if output.is_block() {
            self.alert(&output);
        }
        output
    }

    fn persist(&self, output: &GuardDecisionOutput) {
        let Some(repo) = &self.repository else {
            return;
        };
        if let Err(e) = repo.log_decision(output) {
            error!(evaluation_id = %output.evaluation_id(), error = %e, "Failed to log decision");
            Metrics::persistence_failure("log_decision");
        }
        if let Err(e) = repo.update_stats_for_decision(output) {
            error!(evaluation_id = %output.evaluation_id(), error = %e, "Failed to update daily stats");
            Metrics::persistence_failure("update_stats");
        }
    }

    fn alert(&self, output: &GuardDecisionOutput) {
        let Some(alerter) = &self.alerter else {
            return;
        };
        let now = self.guard.clock().now();
        let outcome = alerter.notify(output, now);
        Metrics::alert(outcome.label());

        let (Some(repo), Some(record)) = (&self.repository, alert_record(&outcome, now)) else {
            return;
        };
        if let Err(e) = repo.log_alert(&record) {
            error!(evaluation_id = %record.evaluation_id, error = %e, "Failed to log alert");
            Metrics::persistence_failure("log_alert");
        }
    }
}

/// Audit record for an alert that passed the policy checks.
fn alert_record(outcome: &AlertOutcome, now: chrono::DateTime<chrono::Utc>) -> Option<AlertRecord> {
    let alert = outcome.alert()?;
    let mut record = AlertRecord::new(
        alert.evaluation_id.clone(),
        TRADE_BLOCKED,
        alert.severity,
        alert.title.clone(),
        format_alert(alert),
        now,
    );
    match outcome {
        AlertOutcome::Sent(_) => record.sent = true,
        AlertOutcome::RateLimited(..) => record.rate_limited = true,
        AlertOutcome::Failed(_, e) => record.send_error = Some(e.to_string()),
        AlertOutcome::NoSender(_) => record.send_error = Some("no alert sender configured".to_string()),
        AlertOutcome::Skipped(_) => {}
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guard_alert::{AlertError, MockAlertSender};
    use guard_core::{AlertingConfig, BlockReason, ManualClock, TradeGuardConfig};
    use guard_persistence::InMemoryGuardRepository;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn setup(
        sender: MockAlertSender,
    ) -> (GuardPipeline, Arc<InMemoryGuardRepository>) {
        let clock = clock();
        let guard = Arc::new(TradeGuard::with_clock(TradeGuardConfig::default(), clock.clone()).unwrap());
        let repo = Arc::new(InMemoryGuardRepository::new(clock));
        let alerter = GuardAlerter::new(AlertingConfig::default(), Some(Arc::new(sender)));
        let pipeline = GuardPipeline::new(guard)
            .with_repository(repo.clone())
            .with_alerter(alerter);
        (pipeline, repo)
    }

    #[test]
    fn test_block_is_logged_and_alerted() {
        let mut sender = MockAlertSender::new();
        sender.expect_send().times(1).returning(|_, _| Ok(()));
        let (pipeline, repo) = setup(sender);

        let output = pipeline.evaluate(&GuardInput::default());
        assert_eq!(output.reason(), Some(BlockReason::IeGuardInternalError));

        assert_eq!(repo.decision_count(), 1);
        let alerts = repo.get_recent_alerts(1, 10).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].sent);
        assert_eq!(alerts[0].alert_type, TRADE_BLOCKED);
        assert_eq!(alerts[0].evaluation_id, output.evaluation_id());

        let stats = repo
            .get_or_create_daily_stats(output.timestamp().date_naive())
            .unwrap();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.alerts_sent, 1);
    }

    #[test]
    fn test_failed_delivery_is_recorded() {
        let mut sender = MockAlertSender::new();
        sender
            .expect_send()
            .returning(|_, _| Err(AlertError::Delivery("webhook 500".to_string())));
        let (pipeline, repo) = setup(sender);

        let output = pipeline.evaluate(&GuardInput::default());
        assert!(output.is_block());

        let alerts = repo.get_recent_alerts(1, 10).unwrap();
        assert!(!alerts[0].sent);
        assert!(alerts[0].send_error.as_deref().unwrap().contains("webhook 500"));
    }

    #[test]
    fn test_second_block_is_rate_limited() {
        let mut sender = MockAlertSender::new();
        sender.expect_send().times(1).returning(|_, _| Ok(()));
        let (pipeline, repo) = setup(sender);

        pipeline.evaluate(&GuardInput::default());
        pipeline.evaluate(&GuardInput::default());

        let alerts = repo.get_recent_alerts(1, 10).unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].rate_limited, "newest first");
        assert_eq!(repo.count_alerts_in_window(60).unwrap(), 1);
    }

    #[test]
    fn test_pipeline_without_sinks() {
        let guard = Arc::new(TradeGuard::with_clock(TradeGuardConfig::default(), clock()).unwrap());
        let pipeline = GuardPipeline::new(guard);
        assert!(pipeline.evaluate(&GuardInput::default()).is_block());
        assert!(pipeline.repository().is_none());
    }
}
