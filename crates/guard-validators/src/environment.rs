//! Market regime: risk level, escalation, circuit breaker, volatility and
//! liquidity.

use crate::checks::{below, contains_ignore_case, details, exceeds};
use crate::error::{CheckFailure, CheckResult};
use crate::validator::{Validator, ValidatorMeta};
use chrono::{DateTime, Utc};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, EnvironmentalConfig, EnvironmentalContext,
    GuardSections,
};
use serde_json::json;

pub struct EnvironmentValidator {
    config: EnvironmentalConfig,
}

impl EnvironmentValidator {
    pub const META: ValidatorMeta = ValidatorMeta {
        name: "EnvironmentValidator",
        category: BlockCategory::Environmental,
        description: "Risk level, escalation, circuit breaker, volatility and liquidity checks",
        is_critical: true,
    };

    pub fn new(config: EnvironmentalConfig) -> Self {
        Self { config }
    }

    fn check_risk(&self, env: &EnvironmentalContext) -> CheckResult {
        if !self.config.block_on_critical_risk {
            return Ok(());
        }
        if let Some(level) = env.current_risk_level.as_deref() {
            if contains_ignore_case(&self.config.critical_risk_levels, level) {
                return Err(CheckFailure::new(
                    BlockReason::EeRiskLevelCritical,
                    BlockSeverity::Emergency,
                    format!("Risk level critical: {level}"),
                )
                .with("risk_level", level)
                .with("risk_score", env.risk_score));
            }
        }
        if let Some(score) = env.risk_score {
            if exceeds(score, self.config.max_risk_score) {
                return Err(CheckFailure::new(
                    BlockReason::EeRiskLevelCritical,
                    BlockSeverity::High,
                    format!("Risk score too high: {score:.2}"),
                )
                .with("risk_score", score)
                .with("max_risk_score", self.config.max_risk_score));
            }
        }
        Ok(())
    }

    fn check_escalation(&self, env: &EnvironmentalContext) -> CheckResult {
        if !self.config.block_on_escalation {
            return Ok(());
        }
        match env.escalation_level {
            Some(level) if level >= self.config.min_escalation_level_to_block => {
                Err(CheckFailure::new(
                    BlockReason::EeSystemEscalationActive,
                    BlockSeverity::High,
                    format!("System escalation active: level {level}"),
                )
                .with("escalation_level", level)
                .with("escalation_reason", &env.escalation_reason)
                .with("min_level_to_block", self.config.min_escalation_level_to_block))
            }
            _ => Ok(()),
        }
    }

    fn check_circuit_breaker(&self, env: &EnvironmentalContext) -> CheckResult {
        if self.config.respect_circuit_breaker && env.circuit_breaker_active {
            return Err(CheckFailure::new(
                BlockReason::EeCircuitBreakerTriggered,
                BlockSeverity::Critical,
                "Circuit breaker triggered",
            )
            .with("triggered_at", env.circuit_breaker_triggered_at));
        }
        Ok(())
    }

    fn check_volatility(&self, env: &EnvironmentalContext) -> CheckResult {
        if let Some(regime) = env.volatility_regime.as_deref() {
            if contains_ignore_case(&self.config.volatility_regimes_blocked, regime) {
                return Err(CheckFailure::new(
                    BlockReason::EeExtremeVolatility,
                    BlockSeverity::High,
                    format!("Volatility regime blocked: {regime}"),
                )
                .with("volatility_regime", regime));
            }
        }
        if let Some(volatility) = env.current_volatility {
            if exceeds(volatility, self.config.max_volatility_for_trading) {
                return Err(CheckFailure::new(
                    BlockReason::EeExtremeVolatility,
                    BlockSeverity::High,
                    format!("Volatility too high: {:.1}%", volatility * 100.0),
                )
                .with("current_volatility", volatility)
                .with("max_volatility", self.config.max_volatility_for_trading));
            }
        }
        Ok(())
    }

    fn check_liquidity(&self, env: &EnvironmentalContext) -> CheckResult {
        if let Some(liquidity) = env.liquidity_score {
            if below(liquidity, self.config.min_liquidity_score) {
                return Err(CheckFailure::new(
                    BlockReason::EeLiquidityEmergency,
                    BlockSeverity::Medium,
                    format!("Liquidity too low: {liquidity:.2}"),
                )
                .with("liquidity_score", liquidity)
                .with("min_liquidity_score", self.config.min_liquidity_score));
            }
        }
        Ok(())
    }

    fn check_spread(&self, env: &EnvironmentalContext) -> CheckResult {
        if let Some(spread) = env.current_spread_pct {
            if exceeds(spread, self.config.max_spread_pct) {
                return Err(CheckFailure::new(
                    BlockReason::EeLiquidityEmergency,
                    BlockSeverity::Medium,
                    format!("Spread too wide: {spread:.2}%"),
                )
                .with("spread_pct", spread)
                .with("max_spread_pct", self.config.max_spread_pct));
            }
        }
        Ok(())
    }
}

impl Validator for EnvironmentValidator {
    fn meta(&self) -> ValidatorMeta {
        Self::META
    }

    fn check(&self, s: &GuardSections<'_>, _now: DateTime<Utc>) -> CheckResult<Details> {
        let env = s.environment;
        self.check_risk(env)?;
        self.check_escalation(env)?;
        self.check_circuit_breaker(env)?;
        self.check_volatility(env)?;
        self.check_liquidity(env)?;
        self.check_spread(env)?;

        Ok(details(json!({
            "risk_level": env.current_risk_level,
            "volatility_regime": env.volatility_regime,
            "liquidity_score": env.liquidity_score,
            "near_support": env.near_support,
            "near_resistance": env.near_resistance,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{healthy_input, now};

    fn run(config: EnvironmentalConfig, mutate: impl FnOnce(&mut EnvironmentalContext)) -> CheckResult<Details> {
        let mut input = healthy_input();
        mutate(input.environmental_context.as_mut().unwrap());
        let sections = input.sections().unwrap();
        EnvironmentValidator::new(config).check(&sections, now())
    }

    fn fail(mutate: impl FnOnce(&mut EnvironmentalContext)) -> CheckFailure {
        run(EnvironmentalConfig::default(), mutate).unwrap_err()
    }

    #[test]
    fn test_healthy_passes() {
        assert!(run(EnvironmentalConfig::default(), |_| {}).is_ok());
    }

    #[test]
    fn test_named_risk_level_is_emergency() {
        let failure = fail(|e| e.current_risk_level = Some("extreme".to_string()));
        assert_eq!(failure.reason, BlockReason::EeRiskLevelCritical);
        assert_eq!(failure.severity, BlockSeverity::Emergency);
    }

    #[test]
    fn test_risk_score() {
        assert!(run(EnvironmentalConfig::default(), |e| e.risk_score = Some(0.90)).is_ok());
        let failure = fail(|e| e.risk_score = Some(0.91));
        assert_eq!(failure.severity, BlockSeverity::High);
    }

    #[test]
    fn test_escalation_threshold_is_inclusive() {
        assert!(run(EnvironmentalConfig::default(), |e| e.escalation_level = Some(1)).is_ok());
        let failure = fail(|e| e.escalation_level = Some(2));
        assert_eq!(failure.reason, BlockReason::EeSystemEscalationActive);
        assert_eq!(failure.severity, BlockSeverity::High);
    }

    #[test]
    fn test_circuit_breaker() {
        let failure = fail(|e| e.circuit_breaker_active = true);
        assert_eq!(failure.reason, BlockReason::EeCircuitBreakerTriggered);
        assert_eq!(failure.severity, BlockSeverity::Critical);

        let relaxed = EnvironmentalConfig {
            respect_circuit_breaker: false,
            ..EnvironmentalConfig::default()
        };
        assert!(run(relaxed, |e| e.circuit_breaker_active = true).is_ok());
    }

    #[test]
    fn test_volatility() {
        let failure = fail(|e| e.volatility_regime = Some("Crisis".to_string()));
        assert_eq!(failure.reason, BlockReason::EeExtremeVolatility);

        let failure = fail(|e| e.current_volatility = Some(0.15));
        assert_eq!(failure.reason, BlockReason::EeExtremeVolatility);
        assert_eq!(failure.details["max_volatility"], 0.10);
    }

    #[test]
    fn test_liquidity_and_spread() {
        let failure = fail(|e| e.liquidity_score = Some(0.29));
        assert_eq!(failure.reason, BlockReason::EeLiquidityEmergency);

        let failure = fail(|e| e.current_spread_pct = Some(1.5));
        assert_eq!(failure.reason, BlockReason::EeLiquidityEmergency);
        assert_eq!(failure.severity, BlockSeverity::Medium);
    }

    #[test]
    fn test_missing_optional_metrics_pass() {
        assert!(run(EnvironmentalConfig::default(), |e| *e = EnvironmentalContext::default()).is_ok());
    }
}
