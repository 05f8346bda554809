//! Decision vocabulary: the binary verdict and the block reason taxonomy.
//!
//! Every `BlockReason` belongs to exactly one `BlockCategory`, derived from
//! its code prefix (`SI_`, `ES_`, `SC_`, `RV_`, `EE_`, `IE_`). Severity is
//! used for alert prioritization only and never changes the verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final verdict of the gate. There is no third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardDecision {
    /// Trade may proceed to the execution engine.
    Execute,
    /// Trade is rejected. Final for this request.
    Block,
}

impl GuardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "EXECUTE",
            Self::Block => "BLOCK",
        }
    }
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier of a block, ordered from LOW (1) to EMERGENCY (5).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
    Emergency = 5,
}

impl BlockSeverity {
    pub const ALL: [BlockSeverity; 5] = [
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
        Self::Emergency,
    ];

    /// Numeric level (1-5).
    #[must_use]
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for BlockSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partition of the reason taxonomy per validator family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockCategory {
    SystemIntegrity,
    ExecutionSafety,
    StateConsistency,
    RuleViolation,
    Environmental,
    InternalError,
}

impl BlockCategory {
    pub const ALL: [BlockCategory; 6] = [
        Self::SystemIntegrity,
        Self::ExecutionSafety,
        Self::StateConsistency,
        Self::RuleViolation,
        Self::Environmental,
        Self::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemIntegrity => "SYSTEM_INTEGRITY",
            Self::ExecutionSafety => "EXECUTION_SAFETY",
            Self::StateConsistency => "STATE_CONSISTENCY",
            Self::RuleViolation => "RULE_VIOLATION",
            Self::Environmental => "ENVIRONMENTAL",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed enumeration of reasons a trade can be blocked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    // System integrity
    SiMissingMarketData,
    SiStaleMarketData,
    SiFeaturePipelineDesync,
    SiClockDrift,
    SiTimestampInconsistency,
    SiDuplicateRequest,
    SiInvalidRequestSignature,

    // Execution safety
    EsExchangeApiUnstable,
    EsExchangeUnreachable,
    EsOrderFailureThreshold,
    EsRateLimitExhausted,
    EsUnconfirmedOrders,
    EsPendingCancellation,
    EsNetworkLatencyHigh,

    // State consistency
    ScPositionStateMismatch,
    ScUnknownOpenOrders,
    ScBalanceInconsistency,
    ScMarginStateUndefined,
    ScEquityMismatch,
    ScPositionSyncPending,

    // Rule violation
    RvOutsideTradingHours,
    RvCooldownActive,
    RvSystemHaltState,
    RvManualInterventionLock,
    RvMaintenanceWindow,
    RvSymbolNotTradeable,
    RvDirectionRestricted,

    // Environmental
    EeRiskLevelCritical,
    EeSystemEscalationActive,
    EeCircuitBreakerTriggered,
    EeExtremeVolatility,
    EeLiquidityEmergency,

    // Internal error
    IeGuardInternalError,
    IeValidatorException,
    IeTimeout,
    IeMissingInput,
}

impl BlockReason {
    pub const ALL: [BlockReason; 36] = [
        Self::SiMissingMarketData,
        Self::SiStaleMarketData,
        Self::SiFeaturePipelineDesync,
        Self::SiClockDrift,
        Self::SiTimestampInconsistency,
        Self::SiDuplicateRequest,
        Self::SiInvalidRequestSignature,
        Self::EsExchangeApiUnstable,
        Self::EsExchangeUnreachable,
        Self::EsOrderFailureThreshold,
        Self::EsRateLimitExhausted,
        Self::EsUnconfirmedOrders,
        Self::EsPendingCancellation,
        Self::EsNetworkLatencyHigh,
        Self::ScPositionStateMismatch,
        Self::ScUnknownOpenOrders,
        Self::ScBalanceInconsistency,
        Self::ScMarginStateUndefined,
        Self::ScEquityMismatch,
        Self::ScPositionSyncPending,
        Self::RvOutsideTradingHours,
        Self::RvCooldownActive,
        Self::RvSystemHaltState,
        Self::RvManualInterventionLock,
        Self::RvMaintenanceWindow,
        Self::RvSymbolNotTradeable,
        Self::RvDirectionRestricted,
        Self::EeRiskLevelCritical,
        Self::EeSystemEscalationActive,
        Self::EeCircuitBreakerTriggered,
        Self::EeExtremeVolatility,
        Self::EeLiquidityEmergency,
        Self::IeGuardInternalError,
        Self::IeValidatorException,
        Self::IeTimeout,
        Self::IeMissingInput,
    ];

    /// Wire code, e.g. `RV_SYSTEM_HALT_STATE`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SiMissingMarketData => "SI_MISSING_MARKET_DATA",
            Self::SiStaleMarketData => "SI_STALE_MARKET_DATA",
            Self::SiFeaturePipelineDesync => "SI_FEATURE_PIPELINE_DESYNC",
            Self::SiClockDrift => "SI_CLOCK_DRIFT",
            Self::SiTimestampInconsistency => "SI_TIMESTAMP_INCONSISTENCY",
            Self::SiDuplicateRequest => "SI_DUPLICATE_REQUEST",
            Self::SiInvalidRequestSignature => "SI_INVALID_REQUEST_SIGNATURE",
            Self::EsExchangeApiUnstable => "ES_EXCHANGE_API_UNSTABLE",
            Self::EsExchangeUnreachable => "ES_EXCHANGE_UNREACHABLE",
            Self::EsOrderFailureThreshold => "ES_ORDER_FAILURE_THRESHOLD",
            Self::EsRateLimitExhausted => "ES_RATE_LIMIT_EXHAUSTED",
            Self::EsUnconfirmedOrders => "ES_UNCONFIRMED_ORDERS",
            Self::EsPendingCancellation => "ES_PENDING_CANCELLATION",
            Self::EsNetworkLatencyHigh => "ES_NETWORK_LATENCY_HIGH",
            Self::ScPositionStateMismatch => "SC_POSITION_STATE_MISMATCH",
            Self::ScUnknownOpenOrders => "SC_UNKNOWN_OPEN_ORDERS",
            Self::ScBalanceInconsistency => "SC_BALANCE_INCONSISTENCY",
            Self::ScMarginStateUndefined => "SC_MARGIN_STATE_UNDEFINED",
            Self::ScEquityMismatch => "SC_EQUITY_MISMATCH",
            Self::ScPositionSyncPending => "SC_POSITION_SYNC_PENDING",
            Self::RvOutsideTradingHours => "RV_OUTSIDE_TRADING_HOURS",
            Self::RvCooldownActive => "RV_COOLDOWN_ACTIVE",
            Self::RvSystemHaltState => "RV_SYSTEM_HALT_STATE",
            Self::RvManualInterventionLock => "RV_MANUAL_INTERVENTION_LOCK",
            Self::RvMaintenanceWindow => "RV_MAINTENANCE_WINDOW",
            Self::RvSymbolNotTradeable => "RV_SYMBOL_NOT_TRADEABLE",
            Self::RvDirectionRestricted => "RV_DIRECTION_RESTRICTED",
            Self::EeRiskLevelCritical => "EE_RISK_LEVEL_CRITICAL",
            Self::EeSystemEscalationActive => "EE_SYSTEM_ESCALATION_ACTIVE",
            Self::EeCircuitBreakerTriggered => "EE_CIRCUIT_BREAKER_TRIGGERED",
            Self::EeExtremeVolatility => "EE_EXTREME_VOLATILITY",
            Self::EeLiquidityEmergency => "EE_LIQUIDITY_EMERGENCY",
            Self::IeGuardInternalError => "IE_GUARD_INTERNAL_ERROR",
            Self::IeValidatorException => "IE_VALIDATOR_EXCEPTION",
            Self::IeTimeout => "IE_TIMEOUT",
            Self::IeMissingInput => "IE_MISSING_INPUT",
        }
    }

    /// Category owning this reason, derived from the code prefix.
    #[must_use]
    pub fn category(&self) -> BlockCategory {
        match &self.code()[..3] {
            "SI_" => BlockCategory::SystemIntegrity,
            "ES_" => BlockCategory::ExecutionSafety,
            "SC_" => BlockCategory::StateConsistency,
            "RV_" => BlockCategory::RuleViolation,
            "EE_" => BlockCategory::Environmental,
            _ => BlockCategory::InternalError,
        }
    }

    /// Severity used when a check does not specify one explicitly.
    #[must_use]
    pub fn default_severity(&self) -> BlockSeverity {
        match self {
            Self::EeRiskLevelCritical
            | Self::EeSystemEscalationActive
            | Self::RvSystemHaltState
            | Self::IeGuardInternalError => BlockSeverity::Critical,

            Self::ScPositionStateMismatch
            | Self::ScBalanceInconsistency
            | Self::EsExchangeUnreachable
            | Self::EeCircuitBreakerTriggered => BlockSeverity::High,

            Self::SiStaleMarketData
            | Self::EsOrderFailureThreshold
            | Self::ScUnknownOpenOrders
            | Self::RvCooldownActive => BlockSeverity::Medium,

            _ => BlockSeverity::Low,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
