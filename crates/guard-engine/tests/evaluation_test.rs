//! End-to-end evaluation tests against `TradeGuard`.
//!
//! Covers:
//! - All-pass execute and first-failure-wins ordering
//! - Fail-closed handling of panics and missing sections
//! - Duplicate request window
//! - Total and per-validator time budgets
//! - Reference block scenarios

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{guard, healthy_input, healthy_input_at, manual_clock, t0, unique_request_id};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, GuardDecision, GuardSections,
    TradeGuardConfig,
};
use guard_engine::{default_validators, TradeGuard, INPUT_CHECK_VALIDATOR, TOTAL_TIMEOUT_VALIDATOR};
use guard_validators::{CheckResult, DuplicateRequestCache, Validator, ValidatorMeta};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const INJECTED: ValidatorMeta = ValidatorMeta {
    name: "InjectedValidator",
    category: BlockCategory::InternalError,
    description: "Injected test validator",
    is_critical: false,
};

/// Panics on every call.
struct PanickingValidator;

impl Validator for PanickingValidator {
    fn meta(&self) -> ValidatorMeta {
        INJECTED
    }

    fn check(&self, _: &GuardSections<'_>, _: DateTime<Utc>) -> CheckResult<Details> {
        panic!("validator exploded");
    }
}

/// Sleeps, then passes.
struct SlowValidator(std::time::Duration);

impl Validator for SlowValidator {
    fn meta(&self) -> ValidatorMeta {
        INJECTED
    }

    fn check(&self, _: &GuardSections<'_>, _: DateTime<Utc>) -> CheckResult<Details> {
        std::thread::sleep(self.0);
        Ok(Details::new())
    }
}

/// Counts invocations, then passes.
struct CountingValidator(Arc<AtomicUsize>);

impl Validator for CountingValidator {
    fn meta(&self) -> ValidatorMeta {
        INJECTED
    }

    fn check(&self, _: &GuardSections<'_>, _: DateTime<Utc>) -> CheckResult<Details> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Details::new())
    }
}

/// Default validators with `extra` inserted at `position`.
fn guard_with_extra(
    config: TradeGuardConfig,
    position: usize,
    extra: Box<dyn Validator>,
) -> TradeGuard {
    let clock = manual_clock();
    let cache = Arc::new(DuplicateRequestCache::new(
        config.system_integrity.duplicate_window_seconds,
    ));
    let mut validators = default_validators(&config, cache.clone());
    validators.insert(position, extra);
    TradeGuard::with_validators(config, clock, cache, validators).unwrap()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_all_pass_executes_with_five_results() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);

    let output = guard.evaluate(&healthy_input());

    assert_eq!(output.decision(), GuardDecision::Execute);
    assert!(output.reason().is_none());
    assert!(output.severity().is_none());
    assert!(output.category().is_none());
    assert_eq!(output.validation_results().len(), 5);
    assert!(output.validation_results().iter().all(|r| r.is_valid));
    assert_eq!(output.timestamp(), t0());
    assert!(output.evaluation_time_ms() >= 0.0);
}

#[test]
fn test_first_failure_wins() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);

    // Rule and Environment would both block.
    let mut input = healthy_input();
    input.halt_state.as_mut().unwrap().is_halted = true;
    input.environmental_context.as_mut().unwrap().circuit_breaker_active = true;

    let output = guard.evaluate(&input);

    assert_eq!(output.reason(), Some(BlockReason::RvSystemHaltState));
    assert_eq!(output.category(), Some(BlockCategory::RuleViolation));
    assert_eq!(output.validation_results().len(), 1);
    assert_eq!(output.validation_results()[0].validator_name, "RuleValidator");
}

#[test]
fn test_later_failure_keeps_earlier_passes() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);

    let mut input = healthy_input();
    input.environmental_context.as_mut().unwrap().circuit_breaker_active = true;

    let output = guard.evaluate(&input);

    assert_eq!(output.category(), Some(BlockCategory::Environmental));
    let results = output.validation_results();
    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(|r| r.is_valid));
    assert!(!results[4].is_valid);
}

// ============================================================================
// Fail-closed
// ============================================================================

#[test]
fn test_panicking_validator_blocks_critical() {
    let guard = guard_with_extra(TradeGuardConfig::default(), 2, Box::new(PanickingValidator));

    let output = guard.evaluate(&healthy_input());

    assert!(output.is_block());
    assert_eq!(output.reason(), Some(BlockReason::IeGuardInternalError));
    assert_eq!(output.severity(), Some(BlockSeverity::Critical));
    assert_eq!(output.category(), Some(BlockCategory::InternalError));
    assert_eq!(output.details()["error_type"], "panic");
    assert_eq!(output.details()["error_message"], "validator exploded");
    assert!(output.request_id().is_some());
}

#[test]
fn test_guard_survives_repeated_panics() {
    let guard = guard_with_extra(TradeGuardConfig::default(), 0, Box::new(PanickingValidator));
    for _ in 0..3 {
        assert!(!guard.is_trade_allowed(&healthy_input()));
    }
}

#[test]
fn test_each_missing_section_blocks_without_running_validators() {
    type Strip = fn(&mut guard_core::GuardInput);
    let strips: [(&str, Strip); 6] = [
        ("trade_intent", |i| i.trade_intent = None),
        ("system_state", |i| i.system_state = None),
        ("execution_health", |i| i.execution_health = None),
        ("halt_state", |i| i.halt_state = None),
        ("account_state", |i| i.account_state = None),
        ("environmental_context", |i| i.environmental_context = None),
    ];

    let calls = Arc::new(AtomicUsize::new(0));
    let guard = guard_with_extra(
        TradeGuardConfig::default(),
        0,
        Box::new(CountingValidator(calls.clone())),
    );

    for (section, strip) in strips {
        let mut input = healthy_input();
        strip(&mut input);
        let output = guard.evaluate(&input);

        assert_eq!(output.reason(), Some(BlockReason::IeGuardInternalError), "{section}");
        assert_eq!(output.severity(), Some(BlockSeverity::Critical));
        let results = output.validation_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].validator_name, INPUT_CHECK_VALIDATOR);
        assert_eq!(output.details()["error_type"], "missing_input");
        assert_eq!(output.details()["missing_sections"][0], section);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Duplicates
// ============================================================================

#[test]
fn test_duplicate_within_window_then_fresh_after() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);
    let request_id = unique_request_id();

    let first = guard.evaluate(&healthy_input_at(t0(), &request_id));
    assert!(first.is_execute());

    clock.advance(Duration::seconds(30));
    let second = guard.evaluate(&healthy_input_at(clock_now(&clock), &request_id));
    assert_eq!(second.reason(), Some(BlockReason::SiDuplicateRequest));
    assert_eq!(second.category(), Some(BlockCategory::SystemIntegrity));

    // Default window is one hour.
    clock.advance(Duration::seconds(3600));
    let third = guard.evaluate(&healthy_input_at(clock_now(&clock), &request_id));
    assert!(third.is_execute(), "{}", third.format_summary());
}

#[test]
fn test_concurrent_duplicates_admit_one() {
    let clock = manual_clock();
    let guard = Arc::new(guard(TradeGuardConfig::default(), &clock));
    let input = healthy_input();

    let executed = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                let input = input.clone();
                scope.spawn(move || guard.evaluate(&input).is_execute())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|executed| *executed)
            .count()
    });

    assert_eq!(executed, 1);
    assert_eq!(guard.duplicate_cache().len(), 1);
}

fn clock_now(clock: &Arc<guard_core::ManualClock>) -> DateTime<Utc> {
    use guard_core::Clock;
    clock.now()
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_total_budget_exceeded_blocks_with_timeout() {
    let mut config = TradeGuardConfig::default();
    config.timing.max_evaluation_time_ms = 10;
    config.timing.validator_timeout_ms = 1_000;
    let guard = guard_with_extra(
        config,
        0,
        Box::new(SlowValidator(std::time::Duration::from_millis(30))),
    );

    let output = guard.evaluate(&healthy_input());

    assert_eq!(output.reason(), Some(BlockReason::IeTimeout));
    assert_eq!(output.severity(), Some(BlockSeverity::High));
    let results = output.validation_results();
    assert!(results.len() < 5);
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].validator_name, TOTAL_TIMEOUT_VALIDATOR);
    assert_eq!(output.details()["next_validator"], "RuleValidator");
    assert_eq!(output.details()["validators_completed"], 1);
}

#[test]
fn test_strict_validator_overrun_blocks() {
    let mut config = TradeGuardConfig::default();
    config.timing.max_evaluation_time_ms = 1_000;
    config.timing.validator_timeout_ms = 5;
    let guard = guard_with_extra(
        config,
        1,
        Box::new(SlowValidator(std::time::Duration::from_millis(20))),
    );

    let output = guard.evaluate(&healthy_input());

    assert_eq!(output.reason(), Some(BlockReason::IeTimeout));
    let last = output.validation_results().last().unwrap();
    assert_eq!(last.validator_name, "InjectedValidator");
}

#[test]
fn test_lenient_validator_overrun_only_logs() {
    let mut config = TradeGuardConfig::default();
    config.timing.max_evaluation_time_ms = 1_000;
    config.timing.validator_timeout_ms = 5;
    config.timing.strict_timing = false;
    let guard = guard_with_extra(
        config,
        1,
        Box::new(SlowValidator(std::time::Duration::from_millis(20))),
    );

    let output = guard.evaluate(&healthy_input());

    assert!(output.is_execute(), "{}", output.format_summary());
    assert_eq!(output.validation_results().len(), 6);
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_scenario_system_halt() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);
    let mut input = healthy_input();
    input.halt_state.as_mut().unwrap().is_halted = true;

    let output = guard.evaluate(&input);

    assert_eq!(output.reason(), Some(BlockReason::RvSystemHaltState));
    assert_eq!(output.severity(), Some(BlockSeverity::Emergency));
    assert_eq!(output.category(), Some(BlockCategory::RuleViolation));
}

#[test]
fn test_scenario_healthy_executes() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);
    assert!(guard.is_trade_allowed(&healthy_input()));
}

#[test]
fn test_scenario_exchange_latency() {
    let clock = manual_clock();
    let mut config = TradeGuardConfig::default();
    config.execution_safety.max_exchange_latency_ms = 2000.0;
    let guard = guard(config, &clock);
    let mut input = healthy_input();
    input.execution_health.as_mut().unwrap().exchange_latency_ms = Some(5000.0);

    let output = guard.evaluate(&input);

    assert_eq!(output.reason(), Some(BlockReason::EsExchangeApiUnstable));
    assert_eq!(output.severity(), Some(BlockSeverity::High));
    assert_eq!(output.category(), Some(BlockCategory::ExecutionSafety));
    assert_eq!(output.validation_results().len(), 3);
}

#[test]
fn test_scenario_position_mismatch() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);
    let mut input = healthy_input();
    let account = input.account_state.as_mut().unwrap();
    account.system_position_count = Some(2);
    account.exchange_position_count = Some(3);

    let output = guard.evaluate(&input);

    assert_eq!(output.reason(), Some(BlockReason::ScPositionStateMismatch));
    assert_eq!(output.severity(), Some(BlockSeverity::Critical));
    assert_eq!(output.category(), Some(BlockCategory::StateConsistency));
}

#[test]
fn test_decision_serializes_for_audit() {
    let clock = manual_clock();
    let guard = guard(TradeGuardConfig::default(), &clock);
    let mut input = healthy_input();
    input.halt_state.as_mut().unwrap().is_halted = true;

    let output = guard.evaluate(&input);
    let json = serde_json::to_value(&output).unwrap();

    assert_eq!(json["decision"], "BLOCK");
    assert_eq!(json["reason"], "RV_SYSTEM_HALT_STATE");
    assert_eq!(json["severity"], "EMERGENCY");
    assert!(json["evaluation_id"]
        .as_str()
        .unwrap()
        .starts_with("GUARD-20240501120000"));
}
