//! Guard configuration.
//!
//! Pure data: one bundle per validator family, timing ceilings, alerting
//! policy and the two fail-closed master switches. Three presets are
//! provided (`default`, `strict`, `testing`); any preset can be refined by
//! deep-merging a JSON object of overrides.
//!
//! Unknown keys are rejected everywhere so a misspelt threshold cannot
//! silently fall back to its default.

use crate::decision::BlockSeverity;
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Upper bound for the duplicate window and the alert spacing (one year).
pub const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 3600;

// ============================================================================
// System integrity
// ============================================================================

/// Data freshness, clock and replay thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemIntegrityConfig {
    /// Market data older than this blocks. Default: 30.
    #[serde(default = "default_max_market_data_age_seconds")]
    pub max_market_data_age_seconds: f64,
    /// Coverage below this percentage blocks. Default: 95.
    #[serde(default = "default_min_symbol_coverage_pct")]
    pub min_symbol_coverage_pct: f64,
    /// Default: 60.
    #[serde(default = "default_max_feature_pipeline_lag_seconds")]
    pub max_feature_pipeline_lag_seconds: f64,
    #[serde(default = "default_true")]
    pub require_feature_sync: bool,
    /// Absolute drift above this blocks. Default: 1000.
    #[serde(default = "default_max_clock_drift_ms")]
    pub max_clock_drift_ms: f64,
    #[serde(default = "default_true")]
    pub require_ntp_sync: bool,
    /// Intents older than this block. Default: 300.
    #[serde(default = "default_max_request_age_seconds")]
    pub max_request_age_seconds: f64,
    /// Intents stamped further than this into the future block. Default: 10.
    #[serde(default = "default_max_future_timestamp_seconds")]
    pub max_future_timestamp_seconds: f64,
    /// Replay window for request ids. Default: 3600.
    #[serde(default = "default_duplicate_window_seconds")]
    pub duplicate_window_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_market_data_age_seconds() -> f64 {
    30.0
}

fn default_min_symbol_coverage_pct() -> f64 {
    95.0
}

fn default_max_feature_pipeline_lag_seconds() -> f64 {
    60.0
}

fn default_max_clock_drift_ms() -> f64 {
    1000.0
}

fn default_max_request_age_seconds() -> f64 {
    300.0
}

fn default_max_future_timestamp_seconds() -> f64 {
    10.0
}

fn default_duplicate_window_seconds() -> u64 {
    3600 // 1 hour
}

impl Default for SystemIntegrityConfig {
    fn default() -> Self {
        Self {
            max_market_data_age_seconds: default_max_market_data_age_seconds(),
            min_symbol_coverage_pct: default_min_symbol_coverage_pct(),
            max_feature_pipeline_lag_seconds: default_max_feature_pipeline_lag_seconds(),
            require_feature_sync: true,
            max_clock_drift_ms: default_max_clock_drift_ms(),
            require_ntp_sync: true,
            max_request_age_seconds: default_max_request_age_seconds(),
            max_future_timestamp_seconds: default_max_future_timestamp_seconds(),
            duplicate_window_seconds: default_duplicate_window_seconds(),
        }
    }
}

// ============================================================================
// Execution safety
// ============================================================================

/// Exchange and order-flow health thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSafetyConfig {
    pub require_exchange_reachable: bool,
    pub max_exchange_latency_ms: f64,
    /// Compared case-insensitively.
    pub allowed_exchange_statuses: Vec<String>,
    pub min_order_success_rate_1h: f64,
    pub max_order_failures_1h: u32,
    pub max_pending_orders: u32,
    pub max_pending_cancellations: u32,
    pub min_rate_limit_remaining: u32,
    pub max_rate_limit_utilization: f64,
    pub max_network_latency_ms: f64,
    pub require_stable_connection: bool,
    /// Untracked exchange orders tolerated. Default: 0.
    pub max_unknown_open_orders: u32,
}

impl Default for ExecutionSafetyConfig {
    fn default() -> Self {
        Self {
            require_exchange_reachable: true,
            max_exchange_latency_ms: 2000.0,
            allowed_exchange_statuses: vec![
                "OPERATIONAL".to_string(),
                "NORMAL".to_string(),
                "OK".to_string(),
            ],
            min_order_success_rate_1h: 0.90,
            max_order_failures_1h: 5,
            max_pending_orders: 3,
            max_pending_cancellations: 2,
            min_rate_limit_remaining: 100,
            max_rate_limit_utilization: 0.80,
            max_network_latency_ms: 1000.0,
            require_stable_connection: true,
            max_unknown_open_orders: 0,
        }
    }
}

// ============================================================================
// State consistency
// ============================================================================

/// System-versus-exchange reconciliation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConsistencyConfig {
    pub require_position_sync: bool,
    pub max_position_sync_age_seconds: f64,
    pub allow_position_mismatch: bool,
    /// Percentage of exchange equity.
    pub equity_mismatch_tolerance_pct: Decimal,
    pub require_equity_match: bool,
    pub min_available_balance: Decimal,
    pub require_margin_state_defined: bool,
    /// Compared case-insensitively.
    pub allowed_margin_modes: Vec<String>,
    pub max_margin_ratio: f64,
}

impl Default for StateConsistencyConfig {
    fn default() -> Self {
        Self {
            require_position_sync: true,
            max_position_sync_age_seconds: 120.0,
            allow_position_mismatch: false,
            equity_mismatch_tolerance_pct: Decimal::ONE, // 1%
            require_equity_match: true,
            min_available_balance: Decimal::from(10),
            require_margin_state_defined: true,
            allowed_margin_modes: vec!["CROSS".to_string(), "ISOLATED".to_string()],
            max_margin_ratio: 0.80,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Allowed trading window in whole UTC hours.
///
/// `start_hour <= hour < end_hour`. A window whose start is after its end
/// wraps midnight, e.g. 22-02.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradingWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl TradingWindow {
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl fmt::Display for TradingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

/// Operational policy flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    pub enforce_trading_hours: bool,
    pub allowed_trading_hours_utc: Vec<TradingWindow>,
    pub respect_cooldown: bool,
    pub respect_system_halt: bool,
    pub respect_manual_lock: bool,
    pub block_during_maintenance: bool,
    pub check_symbol_tradeable: bool,
    /// Compared case-insensitively.
    pub restricted_symbols: Vec<String>,
    pub allow_long: bool,
    pub allow_short: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enforce_trading_hours: false,
            allowed_trading_hours_utc: vec![TradingWindow {
                start_hour: 0,
                end_hour: 24,
            }],
            respect_cooldown: true,
            respect_system_halt: true,
            respect_manual_lock: true,
            block_during_maintenance: true,
            check_symbol_tradeable: true,
            restricted_symbols: Vec::new(),
            allow_long: true,
            allow_short: true,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Market regime thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentalConfig {
    pub block_on_critical_risk: bool,
    /// Compared case-insensitively.
    pub critical_risk_levels: Vec<String>,
    pub max_risk_score: f64,
    pub block_on_escalation: bool,
    /// Escalation at or above this level blocks.
    pub min_escalation_level_to_block: u8,
    pub respect_circuit_breaker: bool,
    pub max_volatility_for_trading: f64,
    /// Compared case-insensitively.
    pub volatility_regimes_blocked: Vec<String>,
    pub min_liquidity_score: f64,
    pub max_spread_pct: f64,
}

impl Default for EnvironmentalConfig {
    fn default() -> Self {
        Self {
            block_on_critical_risk: true,
            critical_risk_levels: vec![
                "CRITICAL".to_string(),
                "EXTREME".to_string(),
                "EMERGENCY".to_string(),
            ],
            max_risk_score: 0.90,
            block_on_escalation: true,
            min_escalation_level_to_block: 2,
            respect_circuit_breaker: true,
            max_volatility_for_trading: 0.10,
            volatility_regimes_blocked: vec!["EXTREME".to_string(), "CRISIS".to_string()],
            min_liquidity_score: 0.3,
            max_spread_pct: 1.0,
        }
    }
}

// ============================================================================
// Timing and alerting
// ============================================================================

/// Evaluation time ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Total budget checked before each validator starts. Default: 100.
    #[serde(default = "default_max_evaluation_time_ms")]
    pub max_evaluation_time_ms: u64,
    /// Per-validator budget. Default: 20.
    #[serde(default = "default_validator_timeout_ms")]
    pub validator_timeout_ms: u64,
    /// Convert a per-validator overrun into `IE_TIMEOUT` instead of only logging it.
    #[serde(default = "default_true")]
    pub strict_timing: bool,
}

fn default_max_evaluation_time_ms() -> u64 {
    100
}

fn default_validator_timeout_ms() -> u64 {
    20
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_evaluation_time_ms: default_max_evaluation_time_ms(),
            validator_timeout_ms: default_validator_timeout_ms(),
            strict_timing: true,
        }
    }
}

/// Alerting policy applied to BLOCK decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub alert_on_block: bool,
    /// Blocks below this severity are not alerted. Default: LOW.
    #[serde(default = "default_min_severity_for_alert")]
    pub min_severity_for_alert: BlockSeverity,
    /// Minimum spacing between alerts for the same reason. Default: 60.
    #[serde(default = "default_min_alert_interval_seconds")]
    pub min_alert_interval_seconds: u64,
    /// Default: 30.
    #[serde(default = "default_max_alerts_per_hour")]
    pub max_alerts_per_hour: u32,
}

fn default_min_severity_for_alert() -> BlockSeverity {
    BlockSeverity::Low
}

fn default_min_alert_interval_seconds() -> u64 {
    60
}

fn default_max_alerts_per_hour() -> u32 {
    30
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alert_on_block: true,
            min_severity_for_alert: default_min_severity_for_alert(),
            min_alert_interval_seconds: default_min_alert_interval_seconds(),
            max_alerts_per_hour: default_max_alerts_per_hour(),
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Named configuration preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigPreset {
    /// Production-conservative thresholds.
    #[default]
    Default,
    /// Tighter thresholds.
    Strict,
    /// Relaxed thresholds for deterministic tests.
    Testing,
}

impl fmt::Display for ConfigPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Strict => write!(f, "strict"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

impl FromStr for ConfigPreset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "production" => Ok(Self::Default),
            "strict" => Ok(Self::Strict),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(CoreError::UnknownPreset(other.to_string())),
        }
    }
}

/// Complete guard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradeGuardConfig {
    #[serde(default)]
    pub system_integrity: SystemIntegrityConfig,
    #[serde(default)]
    pub execution_safety: ExecutionSafetyConfig,
    #[serde(default)]
    pub state_consistency: StateConsistencyConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub environmental: EnvironmentalConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
    /// Must stay `true`: internal faults always block.
    #[serde(default = "default_true")]
    pub block_on_internal_error: bool,
    /// Must stay `true`: incomplete input always blocks.
    #[serde(default = "default_true")]
    pub block_on_missing_input: bool,
}

impl Default for TradeGuardConfig {
    fn default() -> Self {
        Self {
            system_integrity: SystemIntegrityConfig::default(),
            execution_safety: ExecutionSafetyConfig::default(),
            state_consistency: StateConsistencyConfig::default(),
            rules: RuleConfig::default(),
            environmental: EnvironmentalConfig::default(),
            timing: TimingConfig::default(),
            alerting: AlertingConfig::default(),
            block_on_internal_error: true,
            block_on_missing_input: true,
        }
    }
}

impl TradeGuardConfig {
    /// Tighter thresholds than the default.
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.system_integrity.max_market_data_age_seconds = 15.0;
        config.system_integrity.max_clock_drift_ms = 500.0;
        config.execution_safety.max_exchange_latency_ms = 1000.0;
        config.execution_safety.min_order_success_rate_1h = 0.95;
        config.execution_safety.max_pending_orders = 1;
        config.state_consistency.max_position_sync_age_seconds = 60.0;
        config.environmental.max_volatility_for_trading = 0.05;
        config.environmental.min_liquidity_score = 0.5;
        config
    }

    /// Relaxed thresholds for deterministic tests. Alerting is disabled.
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.system_integrity.max_market_data_age_seconds = 300.0;
        config.system_integrity.require_ntp_sync = false;
        config.execution_safety.require_exchange_reachable = false;
        config.execution_safety.min_order_success_rate_1h = 0.0;
        config.state_consistency.allow_position_mismatch = true;
        config.state_consistency.require_equity_match = false;
        config.alerting.enabled = false;
        config
    }

    /// Configuration for a named preset.
    pub fn preset(preset: ConfigPreset) -> Self {
        match preset {
            ConfigPreset::Default => Self::default(),
            ConfigPreset::Strict => Self::strict(),
            ConfigPreset::Testing => Self::testing(),
        }
    }

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Return a copy with `overrides` deep-merged on top.
    ///
    /// `overrides` must be a JSON object whose shape mirrors this struct,
    /// e.g. `{"timing": {"max_evaluation_time_ms": 50}}`. Nested objects are
    /// merged key by key; any other value replaces the current one.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        if !overrides.is_object() {
            return Err(CoreError::InvalidConfig(
                "overrides must be a JSON object".to_string(),
            ));
        }
        let mut base = serde_json::to_value(self)?;
        merge_json(&mut base, overrides);
        Ok(serde_json::from_value(base)?)
    }

    /// Reject configurations that would weaken fail-closed behaviour or
    /// cannot be evaluated.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !self.block_on_internal_error {
            problems.push("block_on_internal_error cannot be disabled".to_string());
        }
        if !self.block_on_missing_input {
            problems.push("block_on_missing_input cannot be disabled".to_string());
        }
        if self.timing.max_evaluation_time_ms == 0 {
            problems.push("timing.max_evaluation_time_ms must be > 0".to_string());
        }
        if self.timing.validator_timeout_ms == 0 {
            problems.push("timing.validator_timeout_ms must be > 0".to_string());
        }
        if self.system_integrity.duplicate_window_seconds == 0 {
            problems.push("system_integrity.duplicate_window_seconds must be > 0".to_string());
        }
        if self.system_integrity.duplicate_window_seconds > MAX_WINDOW_SECONDS {
            problems.push(format!(
                "system_integrity.duplicate_window_seconds must be <= {MAX_WINDOW_SECONDS}"
            ));
        }
        if self.alerting.min_alert_interval_seconds > MAX_WINDOW_SECONDS {
            problems.push(format!(
                "alerting.min_alert_interval_seconds must be <= {MAX_WINDOW_SECONDS}"
            ));
        }
        if !(0.0..=100.0).contains(&self.system_integrity.min_symbol_coverage_pct) {
            problems.push("system_integrity.min_symbol_coverage_pct must be within 0-100".to_string());
        }

        let fractions = [
            (
                "execution_safety.min_order_success_rate_1h",
                self.execution_safety.min_order_success_rate_1h,
            ),
            (
                "execution_safety.max_rate_limit_utilization",
                self.execution_safety.max_rate_limit_utilization,
            ),
            (
                "environmental.max_risk_score",
                self.environmental.max_risk_score,
            ),
            (
                "environmental.min_liquidity_score",
                self.environmental.min_liquidity_score,
            ),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{name} must be within 0.0-1.0"));
            }
        }

        if self.state_consistency.equity_mismatch_tolerance_pct.is_sign_negative() {
            problems.push("state_consistency.equity_mismatch_tolerance_pct must be >= 0".to_string());
        }

        for window in &self.rules.allowed_trading_hours_utc {
            if window.start_hour > 24 || window.end_hour > 24 {
                problems.push(format!("trading window {window} has an hour above 24"));
            } else if window.start_hour == window.end_hour {
                problems.push(format!("trading window {window} is empty"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig(problems.join("; ")))
        }
    }
}

/// Recursive object merge: objects merge per key, everything else replaces.
fn merge_json(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
