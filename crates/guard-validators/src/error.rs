//! Validator failure type.
//!
//! Sub-checks return `CheckResult` so a validator body reads as a chain of
//! `?` calls that stops at the first failing check.

use guard_core::{BlockReason, BlockSeverity, Details, ValidationResult};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A failed check: the reason, its severity and diagnostic details.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} ({severity}): {message}")]
pub struct CheckFailure {
    pub reason: BlockReason,
    pub severity: BlockSeverity,
    pub message: String,
    pub details: Details,
}

impl CheckFailure {
    pub fn new(reason: BlockReason, severity: BlockSeverity, message: impl Into<String>) -> Self {
        Self {
            reason,
            severity,
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Failure at the reason's default severity.
    pub fn with_default_severity(reason: BlockReason, message: impl Into<String>) -> Self {
        Self::new(reason, reason.default_severity(), message)
    }

    /// Attach a detail. Values that fail to serialize are recorded as null.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.details.insert(key.to_string(), value);
        self
    }

    /// Details with the message appended under `"message"`.
    pub fn into_details(self) -> Details {
        let mut details = self.details;
        details.insert("message".to_string(), Value::from(self.message));
        details
    }

    /// Convert into a blocking `ValidationResult`.
    pub fn into_result(self, validator_name: &str, validation_time_ms: f64) -> ValidationResult {
        let reason = self.reason;
        let severity = self.severity;
        ValidationResult::block(
            validator_name,
            reason,
            Some(severity),
            self.into_details(),
            validation_time_ms,
        )
    }
}

pub type CheckResult<T = ()> = Result<T, CheckFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_details_end_with_message() {
        let failure = CheckFailure::new(
            BlockReason::EsExchangeApiUnstable,
            BlockSeverity::High,
            "Exchange latency too high: 5000ms",
        )
        .with("exchange_latency_ms", 5000.0)
        .with("max_latency_ms", 2000.0);

        assert_eq!(
            failure.to_string(),
            "ES_EXCHANGE_API_UNSTABLE (HIGH): Exchange latency too high: 5000ms"
        );

        let result = failure.into_result("ExecutionSafetyValidator", 0.3);
        assert!(!result.is_valid);
        let keys: Vec<_> = result.details.keys().cloned().collect();
        assert_eq!(keys, vec!["exchange_latency_ms", "max_latency_ms", "message"]);
        assert_eq!(result.severity, Some(BlockSeverity::High));
    }

    #[test]
    fn test_default_severity_constructor() {
        let failure =
            CheckFailure::with_default_severity(BlockReason::RvCooldownActive, "Cooldown active");
        assert_eq!(failure.severity, BlockSeverity::Medium);
    }
}
