//! The validator contract.

use crate::error::{CheckFailure, CheckResult};
use chrono::{DateTime, Utc};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, GuardSections, TimingConfig,
    ValidationResult,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Static description of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidatorMeta {
    pub name: &'static str,
    pub category: BlockCategory,
    pub description: &'static str,
    pub is_critical: bool,
}

/// One family of safety checks.
///
/// Implementations are pure in-memory checks over the borrowed sections and
/// must finish well inside `TimingConfig::validator_timeout_ms` (sub-20ms by
/// default). There is no cancellation: a slow validator is only detected
/// after it returns.
pub trait Validator: Send + Sync {
    fn meta(&self) -> ValidatorMeta;

    /// Run the checks in their fixed order. `Ok` carries pass details.
    fn check(&self, sections: &GuardSections<'_>, now: DateTime<Utc>) -> CheckResult<Details>;

    /// Timed `check`, converted into a `ValidationResult`.
    ///
    /// With `strict_timing`, an overrun of `validator_timeout_ms` replaces the
    /// result with `IE_TIMEOUT`.
    fn validate(
        &self,
        sections: &GuardSections<'_>,
        now: DateTime<Utc>,
        timing: &TimingConfig,
    ) -> ValidationResult {
        let meta = self.meta();
        let started = Instant::now();
        let outcome = self.check(sections, now);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        if elapsed_ms > timing.validator_timeout_ms as f64 {
            warn!(
                validator = meta.name,
                elapsed_ms,
                timeout_ms = timing.validator_timeout_ms,
                strict = timing.strict_timing,
                "Validator exceeded time budget"
            );
            if timing.strict_timing {
                return CheckFailure::new(
                    BlockReason::IeTimeout,
                    BlockSeverity::High,
                    format!("{} exceeded its time budget", meta.name),
                )
                .with("elapsed_ms", elapsed_ms)
                .with("timeout_ms", timing.validator_timeout_ms)
                .into_result(meta.name, elapsed_ms);
            }
        }

        match outcome {
            Ok(details) => {
                trace!(validator = meta.name, elapsed_ms, "validator passed");
                ValidationResult::pass(meta.name, details, elapsed_ms)
            }
            Err(failure) => {
                debug!(
                    validator = meta.name,
                    reason = %failure.reason,
                    severity = %failure.severity,
                    message = %failure.message,
                    "validator blocked"
                );
                failure.into_result(meta.name, elapsed_ms)
            }
        }
    }
}
