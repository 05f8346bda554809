//! Alert payload built from a BLOCK decision.

use chrono::{DateTime, Utc};
use guard_core::{BlockCategory, BlockReason, BlockSeverity, GuardDecisionOutput};
use serde::Serialize;

pub const TRADE_BLOCKED: &str = "TRADE_BLOCKED";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardAlert {
    pub evaluation_id: String,
    pub severity: BlockSeverity,
    pub category: BlockCategory,
    pub reason: BlockReason,
    pub title: String,
    pub message: String,
    pub symbol: String,
    pub direction: String,
    pub evaluation_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl GuardAlert {
    /// `None` for EXECUTE decisions.
    pub fn from_output(output: &GuardDecisionOutput) -> Option<Self> {
        if !output.is_block() {
            return None;
        }
        let reason = output.reason()?;
        let severity = output.severity().unwrap_or_else(|| reason.default_severity());
        let category = output.category().unwrap_or_else(|| reason.category());
        let (symbol, direction) = match output.trade_intent() {
            Some(intent) => (intent.symbol.clone(), intent.direction.to_string()),
            None => ("UNKNOWN".to_string(), "UNKNOWN".to_string()),
        };

        Some(Self {
            evaluation_id: output.evaluation_id().to_string(),
            severity,
            category,
            reason,
            title: format!("TRADE BLOCKED [{severity}]"),
            message: output
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| reason.code().to_string()),
            symbol,
            direction,
            evaluation_time_ms: output.evaluation_time_ms(),
            timestamp: output.timestamp(),
        })
    }
}
