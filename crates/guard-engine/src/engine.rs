//! The trade guard evaluation engine.
//!
//! `TradeGuard::evaluate` is the single entry point. It returns a decision
//! for every input and never propagates a fault:
//!
//! 1. Presence check: any missing section blocks before a validator runs.
//! 2. Validators run in fixed order; the first failure blocks.
//! 3. The total time budget is checked before each validator starts.
//! 4. A panic anywhere in 1-3 is caught and becomes a CRITICAL block.
//!
//! Only EXECUTE authorizes a trade. Validator order:
//! Rule, SystemIntegrity, ExecutionSafety, StateConsistency, Environment.

use crate::error::EngineResult;
use chrono::{DateTime, Utc};
use guard_core::{
    evaluation_id, BlockReason, BlockSeverity, Clock, GuardDecision, GuardDecisionOutput,
    GuardInput, SystemClock, TradeGuardConfig, ValidationResult,
};
use guard_telemetry::Metrics;
use guard_validators::{
    CheckFailure, DuplicateRequestCache, EnvironmentValidator, ExecutionSafetyValidator,
    RuleValidator, StateConsistencyValidator, SystemIntegrityValidator, Validator, ValidatorMeta,
};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Validator name on the synthetic result for missing sections.
pub const INPUT_CHECK_VALIDATOR: &str = "TradeGuard.InputCheck";
/// Validator name on the synthetic result for a blown total budget.
pub const TOTAL_TIMEOUT_VALIDATOR: &str = "TradeGuard";

/// The five validators in evaluation order.
pub fn default_validators(
    config: &TradeGuardConfig,
    cache: Arc<DuplicateRequestCache>,
) -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(RuleValidator::new(config.rules.clone())),
        Box::new(SystemIntegrityValidator::new(
            config.system_integrity.clone(),
            cache,
        )),
        Box::new(ExecutionSafetyValidator::new(config.execution_safety.clone())),
        Box::new(StateConsistencyValidator::new(config.state_consistency.clone())),
        Box::new(EnvironmentValidator::new(config.environmental.clone())),
    ]
}

/// Snapshot of the engine's configuration for operators.
#[derive(Debug, Clone, Serialize)]
pub struct GuardHealth {
    pub status: &'static str,
    pub validator_count: usize,
    pub validators: Vec<&'static str>,
    pub block_on_internal_error: bool,
    pub block_on_missing_input: bool,
    pub max_evaluation_time_ms: u64,
    pub validator_timeout_ms: u64,
    pub duplicate_cache_entries: usize,
}

/// Fail-closed trade authorization gate.
///
/// `Send + Sync`; share through `Arc` to evaluate from several threads.
/// The duplicate-request cache is the only state carried between calls.
pub struct TradeGuard {
    config: Arc<TradeGuardConfig>,
    validators: Vec<Box<dyn Validator>>,
    cache: Arc<DuplicateRequestCache>,
    clock: Arc<dyn Clock>,
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl TradeGuard {
    /// Guard on the system clock.
    pub fn new(config: TradeGuardConfig) -> EngineResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TradeGuardConfig, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;
        let cache = Arc::new(DuplicateRequestCache::new(
            config.system_integrity.duplicate_window_seconds,
        ));
        let validators = default_validators(&config, cache.clone());
        Ok(Self {
            config: Arc::new(config),
            validators,
            cache,
            clock,
        })
    }

    /// Guard with a caller-supplied validator list, run in the given order.
    ///
    /// `cache` should be the one handed to any `SystemIntegrityValidator`
    /// in the list so that `duplicate_cache()` reports it.
    pub fn with_validators(
        config: TradeGuardConfig,
        clock: Arc<dyn Clock>,
        cache: Arc<DuplicateRequestCache>,
        validators: Vec<Box<dyn Validator>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            validators,
            cache,
            clock,
        })
    }

    pub fn config(&self) -> &TradeGuardConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn duplicate_cache(&self) -> &DuplicateRequestCache {
        &self.cache
    }

    /// Evaluate a trade intent. Never panics, never errors.
    pub fn evaluate(&self, input: &GuardInput) -> GuardDecisionOutput {
        let started = Instant::now();
        let now = self.clock.now();
        let evaluation_id = evaluation_id(now, input.request_id());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(input, &evaluation_id, now, started)
        }));

        let output = match outcome {
            Ok(output) => output,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    evaluation_id = %evaluation_id,
                    request_id = ?input.request_id(),
                    error = %message,
                    "Trade guard internal error, defaulting to BLOCK"
                );
                GuardDecisionOutput::internal_error(
                    evaluation_id,
                    input.trade_intent.clone(),
                    "panic",
                    &message,
                    elapsed_ms(started),
                    now,
                )
            }
        };

        self.record(&output);
        output
    }

    /// `true` only for EXECUTE.
    pub fn is_trade_allowed(&self, input: &GuardInput) -> bool {
        self.evaluate(input).is_execute()
    }

    fn run(
        &self,
        input: &GuardInput,
        evaluation_id: &str,
        now: DateTime<Utc>,
        started: Instant,
    ) -> GuardDecisionOutput {
        let sections = match input.sections() {
            Ok(sections) => sections,
            Err(missing) => {
                let failure = CheckFailure::new(
                    BlockReason::IeGuardInternalError,
                    BlockSeverity::Critical,
                    format!("Missing required input: {}", missing.join(", ")),
                )
                .with("error_type", "missing_input")
                .with("missing_sections", &missing)
                .into_result(INPUT_CHECK_VALIDATOR, 0.0);
                return self.block(input, evaluation_id, failure, Vec::new(), now, started);
            }
        };

        let max_ms = self.config.timing.max_evaluation_time_ms;
        let mut results: Vec<ValidationResult> = Vec::with_capacity(self.validators.len());

        for validator in &self.validators {
            let elapsed = elapsed_ms(started);
            if elapsed > max_ms as f64 {
                let failure = CheckFailure::new(
                    BlockReason::IeTimeout,
                    BlockSeverity::High,
                    format!("Evaluation exceeded {max_ms}ms budget"),
                )
                .with("elapsed_ms", elapsed)
                .with("max_evaluation_time_ms", max_ms)
                .with("validators_completed", results.len())
                .with("next_validator", validator.meta().name)
                .into_result(TOTAL_TIMEOUT_VALIDATOR, 0.0);
                return self.block(input, evaluation_id, failure, results, now, started);
            }

            let result = validator.validate(&sections, now, &self.config.timing);
            Metrics::validator_time(&result.validator_name, result.validation_time_ms);

            if !result.is_valid {
                return self.block(input, evaluation_id, result, results, now, started);
            }
            results.push(result);
        }

        GuardDecisionOutput::execute(
            evaluation_id.to_string(),
            input.trade_intent.clone(),
            results,
            elapsed_ms(started),
            now,
        )
    }

    /// Block on `failure`, appending it to `results`.
    fn block(
        &self,
        input: &GuardInput,
        evaluation_id: &str,
        failure: ValidationResult,
        mut results: Vec<ValidationResult>,
        now: DateTime<Utc>,
        started: Instant,
    ) -> GuardDecisionOutput {
        let last = failure.clone();
        results.push(failure);
        GuardDecisionOutput::block(
            evaluation_id.to_string(),
            input.trade_intent.clone(),
            &last,
            results,
            elapsed_ms(started),
            now,
        )
    }

    fn record(&self, output: &GuardDecisionOutput) {
        Metrics::evaluation(output.decision(), output.evaluation_time_ms());
        Metrics::duplicate_cache_entries(self.cache.len());

        match (output.decision(), output.reason(), output.category(), output.severity()) {
            (GuardDecision::Block, Some(reason), Some(category), Some(severity)) => {
                Metrics::block(reason, category, severity);
                match reason {
                    BlockReason::IeTimeout => Metrics::internal_error("timeout"),
                    BlockReason::IeGuardInternalError => Metrics::internal_error(
                        output
                            .details()
                            .get("error_type")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown"),
                    ),
                    _ => {}
                }
                info!(
                    evaluation_id = %output.evaluation_id(),
                    request_id = ?output.request_id(),
                    reason = %reason,
                    severity = %severity,
                    elapsed_ms = output.evaluation_time_ms(),
                    "{}",
                    output.format_summary()
                );
            }
            _ => {
                debug!(
                    evaluation_id = %output.evaluation_id(),
                    request_id = ?output.request_id(),
                    elapsed_ms = output.evaluation_time_ms(),
                    "{}",
                    output.format_summary()
                );
            }
        }
    }

    /// Name, category, description and criticality of each validator, in order.
    pub fn validator_info(&self) -> Vec<ValidatorMeta> {
        self.validators.iter().map(|v| v.meta()).collect()
    }

    pub fn health_check(&self) -> GuardHealth {
        GuardHealth {
            status: "healthy",
            validator_count: self.validators.len(),
            validators: self.validators.iter().map(|v| v.meta().name).collect(),
            block_on_internal_error: self.config.block_on_internal_error,
            block_on_missing_input: self.config.block_on_missing_input,
            max_evaluation_time_ms: self.config.timing.max_evaluation_time_ms,
            validator_timeout_ms: self.config.timing.validator_timeout_ms,
            duplicate_cache_entries: self.cache.len(),
        }
    }
}

impl std::fmt::Debug for TradeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeGuard")
            .field("validators", &self.validator_info())
            .field("duplicate_cache", &self.cache)
            .finish()
    }
}
