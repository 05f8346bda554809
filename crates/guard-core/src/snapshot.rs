//! Input snapshots assembled by the caller for a single evaluation.
//!
//! The gate performs no I/O. Everything it needs arrives in a `GuardInput`.
//! Sections are `Option` so that an incomplete snapshot deserializes and is
//! then rejected by the engine instead of being defaulted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// A candidate trade produced upstream. Never modified by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    /// Unique per submission; repeated ids are treated as replays.
    pub request_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub requested_size: Decimal,
    /// When the intent was created upstream.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
}

/// Market data and pipeline freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStateSnapshot {
    pub market_data_available: bool,
    pub market_data_timestamp: DateTime<Utc>,
    /// Percentage (0-100) of tracked symbols with live data.
    #[serde(default)]
    pub symbol_coverage_pct: Option<f64>,
    pub feature_pipeline_synced: bool,
    #[serde(default)]
    pub feature_pipeline_lag_seconds: Option<f64>,
    /// Signed drift from reference time.
    #[serde(default)]
    pub clock_drift_ms: Option<f64>,
    pub ntp_synced: bool,
}

/// Exchange connectivity and order-flow health.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHealthMetrics {
    pub exchange_reachable: bool,
    #[serde(default)]
    pub exchange_status: Option<String>,
    #[serde(default)]
    pub exchange_latency_ms: Option<f64>,
    #[serde(default)]
    pub rate_limit_remaining: Option<u32>,
    /// Fraction (0.0-1.0) of the rate-limit budget in use.
    #[serde(default)]
    pub rate_limit_utilization: Option<f64>,
    /// Fraction (0.0-1.0) of orders that succeeded over the last hour.
    #[serde(default)]
    pub order_success_rate_1h: Option<f64>,
    #[serde(default)]
    pub order_failures_1h: Option<u32>,
    #[serde(default)]
    pub pending_order_count: Option<u32>,
    #[serde(default)]
    pub pending_cancellation_count: Option<u32>,
    /// Orders open on the exchange that are not tracked internally.
    #[serde(default)]
    pub unknown_order_count: Option<u32>,
    #[serde(default)]
    pub network_latency_ms: Option<f64>,
    #[serde(default)]
    pub connection_stable: Option<bool>,
}

/// Global halt, lock, maintenance and cooldown flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalHaltState {
    pub is_halted: bool,
    #[serde(default)]
    pub halt_reason: Option<String>,
    #[serde(default)]
    pub halt_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub manual_intervention_active: bool,
    #[serde(default)]
    pub intervention_reason: Option<String>,
    #[serde(default)]
    pub intervention_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub maintenance_active: bool,
    #[serde(default)]
    pub maintenance_end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cooldown_active: bool,
    #[serde(default)]
    pub cooldown_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cooldown_reason: Option<String>,
}

/// System-side versus exchange-side account view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(default)]
    pub system_position_count: Option<u32>,
    #[serde(default)]
    pub exchange_position_count: Option<u32>,
    #[serde(default)]
    pub system_equity: Option<Decimal>,
    #[serde(default)]
    pub exchange_equity: Option<Decimal>,
    #[serde(default)]
    pub available_balance: Option<Decimal>,
    /// e.g. "CROSS" or "ISOLATED".
    #[serde(default)]
    pub margin_mode: Option<String>,
    #[serde(default)]
    pub margin_ratio: Option<f64>,
    #[serde(default)]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// Market regime and escalation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalContext {
    /// Named level, e.g. "LOW", "ELEVATED", "CRITICAL".
    #[serde(default)]
    pub current_risk_level: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub escalation_level: Option<u8>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub circuit_breaker_active: bool,
    #[serde(default)]
    pub circuit_breaker_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volatility_regime: Option<String>,
    #[serde(default)]
    pub current_volatility: Option<f64>,
    #[serde(default)]
    pub liquidity_score: Option<f64>,
    #[serde(default)]
    pub current_spread_pct: Option<f64>,
    #[serde(default)]
    pub near_support: bool,
    #[serde(default)]
    pub near_resistance: bool,
}

/// Everything one evaluation consumes.
///
/// All sections are mandatory for a trade to pass. A missing section blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardInput {
    #[serde(default)]
    pub trade_intent: Option<TradeIntent>,
    #[serde(default)]
    pub system_state: Option<SystemStateSnapshot>,
    #[serde(default)]
    pub execution_health: Option<ExecutionHealthMetrics>,
    #[serde(default)]
    pub halt_state: Option<GlobalHaltState>,
    #[serde(default)]
    pub account_state: Option<AccountState>,
    #[serde(default)]
    pub environmental_context: Option<EnvironmentalContext>,
}

/// Borrowed view of a `GuardInput` whose sections are all present.
#[derive(Debug, Clone, Copy)]
pub struct GuardSections<'a> {
    pub intent: &'a TradeIntent,
    pub system: &'a SystemStateSnapshot,
    pub execution: &'a ExecutionHealthMetrics,
    pub halt: &'a GlobalHaltState,
    pub account: &'a AccountState,
    pub environment: &'a EnvironmentalContext,
}

impl GuardInput {
    /// Names of missing sections, in declaration order.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.trade_intent.is_none() {
            missing.push("trade_intent");
        }
        if self.system_state.is_none() {
            missing.push("system_state");
        }
        if self.execution_health.is_none() {
            missing.push("execution_health");
        }
        if self.halt_state.is_none() {
            missing.push("halt_state");
        }
        if self.account_state.is_none() {
            missing.push("account_state");
        }
        if self.environmental_context.is_none() {
            missing.push("environmental_context");
        }
        missing
    }

    /// Borrow all sections, or return the names of the missing ones.
    pub fn sections(&self) -> Result<GuardSections<'_>, Vec<&'static str>> {
        match (
            &self.trade_intent,
            &self.system_state,
            &self.execution_health,
            &self.halt_state,
            &self.account_state,
            &self.environmental_context,
        ) {
            (
                Some(intent),
                Some(system),
                Some(execution),
                Some(halt),
                Some(account),
                Some(environment),
            ) => Ok(GuardSections {
                intent,
                system,
                execution,
                halt,
                account,
                environment,
            }),
            _ => Err(self.missing_sections()),
        }
    }

    /// Request id of the intent, if present.
    pub fn request_id(&self) -> Option<&str> {
        self.trade_intent.as_ref().map(|i| i.request_id.as_str())
    }
}
