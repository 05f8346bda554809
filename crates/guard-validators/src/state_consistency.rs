//! Reconciliation between the system's view and the exchange's view of the
//! account.

use crate::checks::{age_seconds, contains_ignore_case, details, exceeds};
use crate::error::{CheckFailure, CheckResult};
use crate::validator::{Validator, ValidatorMeta};
use chrono::{DateTime, Utc};
use guard_core::{
    AccountState, BlockCategory, BlockReason, BlockSeverity, Details, GuardSections,
    StateConsistencyConfig,
};
use rust_decimal::Decimal;
use serde_json::json;

pub struct StateConsistencyValidator {
    config: StateConsistencyConfig,
}

/// Percentage difference of `system` relative to `exchange`.
///
/// `None` when the exchange reports zero equity; the caller then requires
/// both sides to be zero.
fn equity_mismatch_pct(system: Decimal, exchange: Decimal) -> Option<Decimal> {
    if exchange.is_zero() {
        return None;
    }
    system
        .checked_sub(exchange)?
        .abs()
        .checked_div(exchange.abs())?
        .checked_mul(Decimal::ONE_HUNDRED)
}

impl StateConsistencyValidator {
    pub const META: ValidatorMeta = ValidatorMeta {
        name: "StateConsistencyValidator",
        category: BlockCategory::StateConsistency,
        description: "Position sync, position count, equity, balance and margin reconciliation",
        is_critical: true,
    };

    pub fn new(config: StateConsistencyConfig) -> Self {
        Self { config }
    }

    fn check_sync(&self, account: &AccountState, now: DateTime<Utc>) -> CheckResult {
        if !self.config.require_position_sync {
            return Ok(());
        }
        let Some(last_sync) = account.last_sync_timestamp else {
            return Err(CheckFailure::new(
                BlockReason::ScPositionSyncPending,
                BlockSeverity::High,
                "Positions never synced with exchange",
            ));
        };
        let age = age_seconds(now, last_sync);
        if exceeds(age, self.config.max_position_sync_age_seconds) {
            return Err(CheckFailure::new(
                BlockReason::ScPositionStateMismatch,
                BlockSeverity::High,
                format!("Position sync stale: {age:.0}s old"),
            )
            .with("sync_age_seconds", age)
            .with("max_sync_age_seconds", self.config.max_position_sync_age_seconds));
        }
        Ok(())
    }

    fn check_position_count(&self, account: &AccountState) -> CheckResult {
        if self.config.allow_position_mismatch {
            return Ok(());
        }
        if let (Some(system), Some(exchange)) =
            (account.system_position_count, account.exchange_position_count)
        {
            if system != exchange {
                return Err(CheckFailure::new(
                    BlockReason::ScPositionStateMismatch,
                    BlockSeverity::Critical,
                    format!("Position count mismatch: system={system}, exchange={exchange}"),
                )
                .with("system_positions", system)
                .with("exchange_positions", exchange)
                .with("difference", i64::from(system) - i64::from(exchange)));
            }
        }
        Ok(())
    }

    fn check_equity(&self, account: &AccountState) -> CheckResult {
        if !self.config.require_equity_match {
            return Ok(());
        }
        let (Some(system), Some(exchange)) = (account.system_equity, account.exchange_equity)
        else {
            return Ok(());
        };

        let tolerance = self.config.equity_mismatch_tolerance_pct;
        let within = match equity_mismatch_pct(system, exchange) {
            Some(pct) => pct <= tolerance,
            // Zero exchange equity, or a ratio too large to represent.
            None => exchange.is_zero() && system.is_zero(),
        };
        if within {
            return Ok(());
        }

        let mut failure = CheckFailure::new(
            BlockReason::ScEquityMismatch,
            BlockSeverity::High,
            format!("Equity mismatch: system={system}, exchange={exchange}"),
        )
        .with("system_equity", system)
        .with("exchange_equity", exchange)
        .with("tolerance_pct", tolerance);
        if let Some(pct) = equity_mismatch_pct(system, exchange) {
            failure = failure.with("mismatch_pct", pct.round_dp(4).normalize());
        }
        Err(failure)
    }

    fn check_balance(&self, account: &AccountState) -> CheckResult {
        let Some(balance) = account.available_balance else {
            return Err(CheckFailure::new(
                BlockReason::ScBalanceInconsistency,
                BlockSeverity::High,
                "Available balance unknown",
            ));
        };
        if balance < self.config.min_available_balance {
            return Err(CheckFailure::new(
                BlockReason::ScBalanceInconsistency,
                BlockSeverity::High,
                format!("Available balance too low: {balance}"),
            )
            .with("available_balance", balance)
            .with("min_balance", self.config.min_available_balance));
        }
        Ok(())
    }

    fn check_margin(&self, account: &AccountState) -> CheckResult {
        if !self.config.require_margin_state_defined {
            return Ok(());
        }
        let Some(mode) = account.margin_mode.as_deref() else {
            return Err(CheckFailure::new(
                BlockReason::ScMarginStateUndefined,
                BlockSeverity::Medium,
                "Margin mode undefined",
            ));
        };
        if !contains_ignore_case(&self.config.allowed_margin_modes, mode) {
            return Err(CheckFailure::new(
                BlockReason::ScMarginStateUndefined,
                BlockSeverity::High,
                format!("Margin mode not allowed: {mode}"),
            )
            .with("margin_mode", mode)
            .with("allowed_modes", &self.config.allowed_margin_modes));
        }
        if let Some(ratio) = account.margin_ratio {
            if exceeds(ratio, self.config.max_margin_ratio) {
                return Err(CheckFailure::new(
                    BlockReason::ScBalanceInconsistency,
                    BlockSeverity::High,
                    format!("Margin ratio too high: {:.1}%", ratio * 100.0),
                )
                .with("margin_ratio", ratio)
                .with("max_margin_ratio", self.config.max_margin_ratio));
            }
        }
        Ok(())
    }
}

impl Validator for StateConsistencyValidator {
    fn meta(&self) -> ValidatorMeta {
        Self::META
    }

    fn check(&self, s: &GuardSections<'_>, now: DateTime<Utc>) -> CheckResult<Details> {
        let account = s.account;
        self.check_sync(account, now)?;
        self.check_position_count(account)?;
        self.check_equity(account)?;
        self.check_balance(account)?;
        self.check_margin(account)?;

        Ok(details(json!({
            "positions_synced": account.last_sync_timestamp.is_some(),
            "available_balance": account.available_balance,
            "margin_mode": account.margin_mode,
        })))
    }
}
