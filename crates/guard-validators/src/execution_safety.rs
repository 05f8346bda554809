//! Exchange connectivity and order-flow health.

use crate::checks::{below, contains_ignore_case, details, exceeds};
use crate::error::{CheckFailure, CheckResult};
use crate::validator::{Validator, ValidatorMeta};
use chrono::{DateTime, Utc};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, ExecutionHealthMetrics,
    ExecutionSafetyConfig, GuardSections,
};
use serde_json::json;

pub struct ExecutionSafetyValidator {
    config: ExecutionSafetyConfig,
}

impl ExecutionSafetyValidator {
    pub const META: ValidatorMeta = ValidatorMeta {
        name: "ExecutionSafetyValidator",
        category: BlockCategory::ExecutionSafety,
        description: "Exchange reachability, latency, rate limits, order health and pending work",
        is_critical: true,
    };

    pub fn new(config: ExecutionSafetyConfig) -> Self {
        Self { config }
    }

    fn check_reachable(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        if self.config.require_exchange_reachable && !health.exchange_reachable {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeUnreachable,
                BlockSeverity::Critical,
                "Exchange unreachable",
            ));
        }
        Ok(())
    }

    fn check_status(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        let Some(status) = health.exchange_status.as_deref() else {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeApiUnstable,
                BlockSeverity::High,
                "Exchange status unknown",
            ));
        };
        if !contains_ignore_case(&self.config.allowed_exchange_statuses, status) {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeApiUnstable,
                BlockSeverity::High,
                format!("Exchange status not operational: {status}"),
            )
            .with("exchange_status", status)
            .with("allowed_statuses", &self.config.allowed_exchange_statuses));
        }
        Ok(())
    }

    fn check_latency(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        let Some(latency) = health.exchange_latency_ms else {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeApiUnstable,
                BlockSeverity::Medium,
                "Exchange latency unknown",
            ));
        };
        if exceeds(latency, self.config.max_exchange_latency_ms) {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeApiUnstable,
                BlockSeverity::High,
                format!("Exchange latency too high: {latency:.0}ms"),
            )
            .with("exchange_latency_ms", latency)
            .with("max_latency_ms", self.config.max_exchange_latency_ms));
        }

        if let Some(network) = health.network_latency_ms {
            if exceeds(network, self.config.max_network_latency_ms) {
                return Err(CheckFailure::new(
                    BlockReason::EsNetworkLatencyHigh,
                    BlockSeverity::Medium,
                    format!("Network latency too high: {network:.0}ms"),
                )
                .with("network_latency_ms", network)
                .with("max_network_latency_ms", self.config.max_network_latency_ms));
            }
        }

        if self.config.require_stable_connection && health.connection_stable == Some(false) {
            return Err(CheckFailure::new(
                BlockReason::EsExchangeApiUnstable,
                BlockSeverity::Medium,
                "Exchange connection unstable",
            ));
        }
        Ok(())
    }

    fn check_rate_limits(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        if let Some(remaining) = health.rate_limit_remaining {
            if below(remaining, self.config.min_rate_limit_remaining) {
                return Err(CheckFailure::new(
                    BlockReason::EsRateLimitExhausted,
                    BlockSeverity::High,
                    format!("Rate limit nearly exhausted: {remaining} remaining"),
                )
                .with("rate_limit_remaining", remaining)
                .with("min_remaining", self.config.min_rate_limit_remaining));
            }
        }
        if let Some(utilization) = health.rate_limit_utilization {
            if exceeds(utilization, self.config.max_rate_limit_utilization) {
                return Err(CheckFailure::new(
                    BlockReason::EsRateLimitExhausted,
                    BlockSeverity::Medium,
                    format!("Rate limit utilization too high: {:.0}%", utilization * 100.0),
                )
                .with("rate_limit_utilization", utilization)
                .with("max_utilization", self.config.max_rate_limit_utilization));
            }
        }
        Ok(())
    }

    fn check_order_health(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        if let Some(failures) = health.order_failures_1h {
            if exceeds(failures, self.config.max_order_failures_1h) {
                return Err(CheckFailure::new(
                    BlockReason::EsOrderFailureThreshold,
                    BlockSeverity::High,
                    format!("Too many order failures in 1h: {failures}"),
                )
                .with("order_failures_1h", failures)
                .with("max_failures", self.config.max_order_failures_1h));
            }
        }
        if let Some(rate) = health.order_success_rate_1h {
            if below(rate, self.config.min_order_success_rate_1h) {
                return Err(CheckFailure::new(
                    BlockReason::EsOrderFailureThreshold,
                    BlockSeverity::High,
                    format!("Order success rate too low: {:.1}%", rate * 100.0),
                )
                .with("order_success_rate_1h", rate)
                .with("min_success_rate", self.config.min_order_success_rate_1h));
            }
        }
        Ok(())
    }

    fn check_pending(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        if let Some(pending) = health.pending_order_count {
            if exceeds(pending, self.config.max_pending_orders) {
                return Err(CheckFailure::new(
                    BlockReason::EsUnconfirmedOrders,
                    BlockSeverity::Medium,
                    format!("Too many pending orders: {pending}"),
                )
                .with("pending_order_count", pending)
                .with("max_pending_orders", self.config.max_pending_orders));
            }
        }
        if let Some(cancellations) = health.pending_cancellation_count {
            if exceeds(cancellations, self.config.max_pending_cancellations) {
                return Err(CheckFailure::new(
                    BlockReason::EsPendingCancellation,
                    BlockSeverity::Medium,
                    format!("Too many pending cancellations: {cancellations}"),
                )
                .with("pending_cancellation_count", cancellations)
                .with("max_pending_cancellations", self.config.max_pending_cancellations));
            }
        }
        Ok(())
    }

    fn check_unknown_orders(&self, health: &ExecutionHealthMetrics) -> CheckResult {
        if let Some(unknown) = health.unknown_order_count {
            if exceeds(unknown, self.config.max_unknown_open_orders) {
                return Err(CheckFailure::new(
                    BlockReason::ScUnknownOpenOrders,
                    BlockSeverity::Critical,
                    format!("Unknown open orders on exchange: {unknown}"),
                )
                .with("unknown_order_count", unknown)
                .with("max_unknown_orders", self.config.max_unknown_open_orders));
            }
        }
        Ok(())
    }
}

impl Validator for ExecutionSafetyValidator {
    fn meta(&self) -> ValidatorMeta {
        Self::META
    }

    fn check(&self, s: &GuardSections<'_>, _now: DateTime<Utc>) -> CheckResult<Details> {
        let health = s.execution;
        self.check_reachable(health)?;
        self.check_status(health)?;
        self.check_latency(health)?;
        self.check_rate_limits(health)?;
        self.check_order_health(health)?;
        self.check_pending(health)?;
        self.check_unknown_orders(health)?;

        Ok(details(json!({
            "exchange_status": health.exchange_status,
            "exchange_latency_ms": health.exchange_latency_ms,
            "rate_limit_remaining": health.rate_limit_remaining,
            "pending_order_count": health.pending_order_count,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{healthy_input, now};
    use guard_core::GuardInput;

    fn run(config: ExecutionSafetyConfig, mutate: impl FnOnce(&mut ExecutionHealthMetrics)) -> CheckResult<Details> {
        let mut input: GuardInput = healthy_input();
        mutate(input.execution_health.as_mut().unwrap());
        let sections = input.sections().unwrap();
        ExecutionSafetyValidator::new(config).check(&sections, now())
    }

    fn fail(mutate: impl FnOnce(&mut ExecutionHealthMetrics)) -> CheckFailure {
        run(ExecutionSafetyConfig::default(), mutate).unwrap_err()
    }

    #[test]
    fn test_healthy_passes() {
        let details = run(ExecutionSafetyConfig::default(), |_| {}).unwrap();
        assert_eq!(details["exchange_status"], "OPERATIONAL");
    }

    #[test]
    fn test_unreachable_is_critical() {
        let failure = fail(|h| h.exchange_reachable = false);
        assert_eq!(failure.reason, BlockReason::EsExchangeUnreachable);
        assert_eq!(failure.severity, BlockSeverity::Critical);

        let relaxed = ExecutionSafetyConfig {
            require_exchange_reachable: false,
            ..ExecutionSafetyConfig::default()
        };
        assert!(run(relaxed, |h| h.exchange_reachable = false).is_ok());
    }

    #[test]
    fn test_status_checks() {
        let failure = fail(|h| h.exchange_status = None);
        assert_eq!(failure.reason, BlockReason::EsExchangeApiUnstable);
        assert_eq!(failure.severity, BlockSeverity::High);

        let failure = fail(|h| h.exchange_status = Some("DEGRADED".to_string()));
        assert_eq!(failure.details["exchange_status"], "DEGRADED");

        assert!(run(ExecutionSafetyConfig::default(), |h| {
            h.exchange_status = Some("ok".to_string());
        })
        .is_ok());
    }

    #[test]
    fn test_latency_boundary() {
        assert!(run(ExecutionSafetyConfig::default(), |h| h.exchange_latency_ms = Some(2000.0)).is_ok());

        let failure = fail(|h| h.exchange_latency_ms = Some(5000.0));
        assert_eq!(failure.reason, BlockReason::EsExchangeApiUnstable);
        assert_eq!(failure.severity, BlockSeverity::High);
        assert_eq!(failure.details["exchange_latency_ms"], 5000.0);
        assert_eq!(failure.details["max_latency_ms"], 2000.0);

        let failure = fail(|h| h.exchange_latency_ms = None);
        assert_eq!(failure.severity, BlockSeverity::Medium);

        let failure = fail(|h| h.exchange_latency_ms = Some(f64::NAN));
        assert_eq!(failure.reason, BlockReason::EsExchangeApiUnstable);
    }

    #[test]
    fn test_network_and_connection() {
        let failure = fail(|h| h.network_latency_ms = Some(1500.0));
        assert_eq!(failure.reason, BlockReason::EsNetworkLatencyHigh);

        let failure = fail(|h| h.connection_stable = Some(false));
        assert_eq!(failure.reason, BlockReason::EsExchangeApiUnstable);
        assert_eq!(failure.severity, BlockSeverity::Medium);

        assert!(run(ExecutionSafetyConfig::default(), |h| h.connection_stable = None).is_ok());
    }

    #[test]
    fn test_rate_limits() {
        let failure = fail(|h| h.rate_limit_remaining = Some(99));
        assert_eq!(failure.reason, BlockReason::EsRateLimitExhausted);
        assert_eq!(failure.severity, BlockSeverity::High);

        let failure = fail(|h| h.rate_limit_utilization = Some(0.81));
        assert_eq!(failure.severity, BlockSeverity::Medium);
    }

    #[test]
    fn test_order_health() {
        let failure = fail(|h| h.order_failures_1h = Some(6));
        assert_eq!(failure.reason, BlockReason::EsOrderFailureThreshold);

        let failure = fail(|h| h.order_success_rate_1h = Some(0.5));
        assert_eq!(failure.reason, BlockReason::EsOrderFailureThreshold);
    }

    #[test]
    fn test_pending_work() {
        let failure = fail(|h| h.pending_order_count = Some(4));
        assert_eq!(failure.reason, BlockReason::EsUnconfirmedOrders);

        let failure = fail(|h| h.pending_cancellation_count = Some(3));
        assert_eq!(failure.reason, BlockReason::EsPendingCancellation);
    }

    #[test]
    fn test_unknown_orders_is_state_consistency_reason() {
        let failure = fail(|h| h.unknown_order_count = Some(1));
        assert_eq!(failure.reason, BlockReason::ScUnknownOpenOrders);
        assert_eq!(failure.severity, BlockSeverity::Critical);
        assert_eq!(failure.reason.category(), BlockCategory::StateConsistency);
    }

    #[test]
    fn test_reachability_checked_first() {
        let failure = fail(|h| {
            h.exchange_reachable = false;
            h.exchange_status = None;
            h.unknown_order_count = Some(5);
        });
        assert_eq!(failure.reason, BlockReason::EsExchangeUnreachable);
    }
}
