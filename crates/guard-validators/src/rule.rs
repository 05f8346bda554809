//! Operational policy: halts, locks, maintenance, trading hours, cooldowns,
//! symbol restrictions and direction restrictions.

use crate::checks::{contains_ignore_case, details};
use crate::error::{CheckFailure, CheckResult};
use crate::validator::{Validator, ValidatorMeta};
use chrono::{DateTime, Timelike, Utc};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, Direction, GlobalHaltState, GuardSections,
    RuleConfig, TradeIntent,
};
use serde_json::json;

pub struct RuleValidator {
    config: RuleConfig,
}

impl RuleValidator {
    pub const META: ValidatorMeta = ValidatorMeta {
        name: "RuleValidator",
        category: BlockCategory::RuleViolation,
        description: "Halt, manual lock, maintenance, trading hours, cooldown and symbol rules",
        is_critical: true,
    };

    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    fn check_halt(&self, halt: &GlobalHaltState) -> CheckResult {
        if self.config.respect_system_halt && halt.is_halted {
            return Err(CheckFailure::new(
                BlockReason::RvSystemHaltState,
                BlockSeverity::Emergency,
                "System is halted",
            )
            .with("halt_reason", &halt.halt_reason)
            .with("halt_timestamp", halt.halt_timestamp));
        }
        Ok(())
    }

    fn check_manual_lock(&self, halt: &GlobalHaltState) -> CheckResult {
        if self.config.respect_manual_lock && halt.manual_intervention_active {
            return Err(CheckFailure::new(
                BlockReason::RvManualInterventionLock,
                BlockSeverity::High,
                "Manual intervention lock is active",
            )
            .with("intervention_reason", &halt.intervention_reason)
            .with("intervention_timestamp", halt.intervention_timestamp));
        }
        Ok(())
    }

    fn check_maintenance(&self, halt: &GlobalHaltState) -> CheckResult {
        if self.config.block_during_maintenance && halt.maintenance_active {
            return Err(CheckFailure::new(
                BlockReason::RvMaintenanceWindow,
                BlockSeverity::Medium,
                "Maintenance window is active",
            )
            .with("maintenance_end", halt.maintenance_end));
        }
        Ok(())
    }

    fn check_trading_hours(&self, now: DateTime<Utc>) -> CheckResult {
        let windows = &self.config.allowed_trading_hours_utc;
        if !self.config.enforce_trading_hours || windows.is_empty() {
            return Ok(());
        }
        // hour() is 0..=23, always fits.
        let hour = now.hour() as u8;
        if windows.iter().any(|w| w.contains(hour)) {
            return Ok(());
        }
        let allowed: Vec<String> = windows.iter().map(ToString::to_string).collect();
        Err(CheckFailure::new(
            BlockReason::RvOutsideTradingHours,
            BlockSeverity::Low,
            format!("Outside trading hours: {hour:02}:00 UTC"),
        )
        .with("current_hour_utc", hour)
        .with("allowed_windows", allowed))
    }

    fn check_cooldown(&self, halt: &GlobalHaltState) -> CheckResult {
        if self.config.respect_cooldown && halt.cooldown_active {
            return Err(CheckFailure::new(
                BlockReason::RvCooldownActive,
                BlockSeverity::Low,
                "Cooldown is active",
            )
            .with("cooldown_end", halt.cooldown_end)
            .with("cooldown_reason", &halt.cooldown_reason));
        }
        Ok(())
    }

    fn check_symbol(&self, intent: &TradeIntent) -> CheckResult {
        if self.config.check_symbol_tradeable
            && contains_ignore_case(&self.config.restricted_symbols, &intent.symbol)
        {
            return Err(CheckFailure::new(
                BlockReason::RvSymbolNotTradeable,
                BlockSeverity::Medium,
                format!("Symbol {} is restricted", intent.symbol),
            )
            .with("symbol", &intent.symbol));
        }
        Ok(())
    }

    fn check_direction(&self, intent: &TradeIntent) -> CheckResult {
        let allowed = match intent.direction {
            Direction::Long => self.config.allow_long,
            Direction::Short => self.config.allow_short,
        };
        if !allowed {
            return Err(CheckFailure::new(
                BlockReason::RvDirectionRestricted,
                BlockSeverity::Medium,
                format!("{} trades are not allowed", intent.direction),
            )
            .with("direction", intent.direction));
        }
        Ok(())
    }
}

impl Validator for RuleValidator {
    fn meta(&self) -> ValidatorMeta {
        Self::META
    }

    fn check(&self, s: &GuardSections<'_>, now: DateTime<Utc>) -> CheckResult<Details> {
        self.check_halt(s.halt)?;
        self.check_manual_lock(s.halt)?;
        self.check_maintenance(s.halt)?;
        self.check_trading_hours(now)?;
        self.check_cooldown(s.halt)?;
        self.check_symbol(s.intent)?;
        self.check_direction(s.intent)?;

        Ok(details(json!({
            "halted": false,
            "trading_hours_enforced": self.config.enforce_trading_hours,
            "symbol": s.intent.symbol,
            "direction": s.intent.direction,
        })))
    }
}
