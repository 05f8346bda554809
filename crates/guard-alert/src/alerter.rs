//! Alert policy and dispatch.

use crate::alert::GuardAlert;
use crate::error::{AlertError, AlertResult};
use crate::formatter::format_alert;
use crate::rate_limiter::{AlertRateLimiter, RateLimitExceeded};
use chrono::{DateTime, Utc};
use guard_core::{AlertingConfig, BlockSeverity, GuardDecisionOutput};
use std::sync::Arc;
use tracing::{debug, warn};

/// Alert transport.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait AlertSender: Send + Sync {
    fn send(&self, alert: &GuardAlert, text: &str) -> AlertResult<()>;
}

/// Writes alerts to the log at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSender;

impl AlertSender for LogAlertSender {
    fn send(&self, alert: &GuardAlert, text: &str) -> AlertResult<()> {
        warn!(
            target: "guard::alert",
            evaluation_id = %alert.evaluation_id,
            reason = %alert.reason,
            severity = %alert.severity,
            "{text}"
        );
        Ok(())
    }
}

/// Why no alert was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NotBlocked,
    BlockAlertsOff,
    BelowMinSeverity { min: BlockSeverity },
}

#[derive(Debug)]
pub enum AlertOutcome {
    Sent(GuardAlert),
    Skipped(SkipReason),
    RateLimited(GuardAlert, RateLimitExceeded),
    Failed(GuardAlert, AlertError),
    /// Alert admitted but no transport configured.
    NoSender(GuardAlert),
}

impl AlertOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent(_) => "sent",
            Self::Skipped(_) => "skipped",
            Self::RateLimited(..) => "rate_limited",
            Self::Failed(..) => "failed",
            Self::NoSender(_) => "no_sender",
        }
    }

    /// The alert, for every outcome past the policy checks.
    pub fn alert(&self) -> Option<&GuardAlert> {
        match self {
            Self::Sent(alert)
            | Self::RateLimited(alert, _)
            | Self::Failed(alert, _)
            | Self::NoSender(alert) => Some(alert),
            Self::Skipped(_) => None,
        }
    }
}

pub struct GuardAlerter {
    config: AlertingConfig,
    limiter: AlertRateLimiter,
    sender: Option<Arc<dyn AlertSender>>,
}

impl GuardAlerter {
    pub fn new(config: AlertingConfig, sender: Option<Arc<dyn AlertSender>>) -> Self {
        let limiter =
            AlertRateLimiter::new(config.min_alert_interval_seconds, config.max_alerts_per_hour);
        Self {
            config,
            limiter,
            sender,
        }
    }

    fn policy(&self, output: &GuardDecisionOutput) -> Result<GuardAlert, SkipReason> {
        if !self.config.enabled {
            return Err(SkipReason::Disabled);
        }
        if !self.config.alert_on_block {
            return Err(SkipReason::BlockAlertsOff);
        }
        let alert = GuardAlert::from_output(output).ok_or(SkipReason::NotBlocked)?;
        if alert.severity < self.config.min_severity_for_alert {
            return Err(SkipReason::BelowMinSeverity {
                min: self.config.min_severity_for_alert,
            });
        }
        Ok(alert)
    }

    /// Apply policy and rate limits, then hand the alert to the sender.
    ///
    /// Only a delivered alert counts against the rate limits.
    pub fn notify(&self, output: &GuardDecisionOutput, now: DateTime<Utc>) -> AlertOutcome {
        let alert = match self.policy(output) {
            Ok(alert) => alert,
            Err(reason) => {
                debug!(evaluation_id = %output.evaluation_id(), ?reason, "Alert skipped");
                return AlertOutcome::Skipped(reason);
            }
        };

        if let Err(limit) = self.limiter.check(alert.reason, now) {
            warn!(
                evaluation_id = %alert.evaluation_id,
                reason = %alert.reason,
                ?limit,
                "Alert rate limited"
            );
            return AlertOutcome::RateLimited(alert, limit);
        }

        let Some(sender) = &self.sender else {
            warn!(
                evaluation_id = %alert.evaluation_id,
                reason = %alert.reason,
                "No alert sender configured"
            );
            return AlertOutcome::NoSender(alert);
        };

        let text = format_alert(&alert);
        match sender.send(&alert, &text) {
            Ok(()) => {
                self.limiter.record(alert.reason, now);
                AlertOutcome::Sent(alert)
            }
            Err(e) => {
                warn!(evaluation_id = %alert.evaluation_id, error = %e, "Alert delivery failed");
                AlertOutcome::Failed(alert, e)
            }
        }
    }
}
