//! Validation results and the final decision output.

use crate::decision::{BlockCategory, BlockReason, BlockSeverity, GuardDecision};
use crate::snapshot::TradeIntent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

/// Ordered key/value diagnostics attached to results.
pub type Details = serde_json::Map<String, Value>;

/// Outcome of a single validator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<BlockReason>,
    pub severity: Option<BlockSeverity>,
    pub details: Details,
    pub validator_name: String,
    pub validation_time_ms: f64,
}

impl ValidationResult {
    /// Passing result.
    pub fn pass(validator_name: impl Into<String>, details: Details, validation_time_ms: f64) -> Self {
        Self {
            is_valid: true,
            reason: None,
            severity: None,
            details,
            validator_name: validator_name.into(),
            validation_time_ms,
        }
    }

    /// Blocking result. Falls back to the reason's default severity.
    pub fn block(
        validator_name: impl Into<String>,
        reason: BlockReason,
        severity: Option<BlockSeverity>,
        details: Details,
        validation_time_ms: f64,
    ) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            severity: Some(severity.unwrap_or_else(|| reason.default_severity())),
            details,
            validator_name: validator_name.into(),
            validation_time_ms,
        }
    }

    #[must_use]
    pub fn category(&self) -> Option<BlockCategory> {
        self.reason.map(|r| r.category())
    }

    /// Human-readable message from `details["message"]`, if any.
    pub fn message(&self) -> Option<&str> {
        self.details.get("message").and_then(Value::as_str)
    }
}

/// Build an evaluation id: `GUARD-{YYYYmmddHHMMSSffffff}-{request id prefix}`.
pub fn evaluation_id(now: DateTime<Utc>, request_id: Option<&str>) -> String {
    let prefix: String = match request_id {
        Some(id) if !id.is_empty() => id.chars().take(8).collect(),
        _ => "UNKNOWN".to_string(),
    };
    format!("GUARD-{}-{}", now.format("%Y%m%d%H%M%S%6f"), prefix)
}

/// Verdict of one evaluation.
///
/// Fields are read-only once constructed. `reason`, `severity` and `category`
/// are populated only for `BLOCK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardDecisionOutput {
    evaluation_id: String,
    decision: GuardDecision,
    trade_intent: Option<TradeIntent>,
    reason: Option<BlockReason>,
    severity: Option<BlockSeverity>,
    category: Option<BlockCategory>,
    details: Details,
    validation_results: Vec<ValidationResult>,
    evaluation_time_ms: f64,
    timestamp: DateTime<Utc>,
}

impl GuardDecisionOutput {
    /// All validators passed.
    pub fn execute(
        evaluation_id: String,
        trade_intent: Option<TradeIntent>,
        validation_results: Vec<ValidationResult>,
        evaluation_time_ms: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut details = Details::new();
        details.insert("status".to_string(), Value::from("All validators passed"));
        Self {
            evaluation_id,
            decision: GuardDecision::Execute,
            trade_intent,
            reason: None,
            severity: None,
            category: None,
            details,
            validation_results,
            evaluation_time_ms,
            timestamp,
        }
    }

    /// Blocked by `failure`, which is normally the last entry of `validation_results`.
    pub fn block(
        evaluation_id: String,
        trade_intent: Option<TradeIntent>,
        failure: &ValidationResult,
        validation_results: Vec<ValidationResult>,
        evaluation_time_ms: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        // A failing result without a reason is itself an internal fault.
        let reason = failure.reason.unwrap_or(BlockReason::IeGuardInternalError);
        let severity = failure
            .severity
            .unwrap_or_else(|| reason.default_severity());
        Self {
            evaluation_id,
            decision: GuardDecision::Block,
            trade_intent,
            reason: Some(reason),
            severity: Some(severity),
            category: Some(reason.category()),
            details: failure.details.clone(),
            validation_results,
            evaluation_time_ms,
            timestamp,
        }
    }

    /// Fail-closed result for a fault caught at the engine boundary.
    pub fn internal_error(
        evaluation_id: String,
        trade_intent: Option<TradeIntent>,
        error_type: &str,
        error_message: &str,
        evaluation_time_ms: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut details = Details::new();
        details.insert("error_type".to_string(), Value::from(error_type));
        details.insert("error_message".to_string(), Value::from(error_message));
        details.insert(
            "message".to_string(),
            Value::from("Internal error in trade guard, defaulting to BLOCK"),
        );
        Self {
            evaluation_id,
            decision: GuardDecision::Block,
            trade_intent,
            reason: Some(BlockReason::IeGuardInternalError),
            severity: Some(BlockSeverity::Critical),
            category: Some(BlockCategory::InternalError),
            details,
            validation_results: Vec::new(),
            evaluation_time_ms,
            timestamp,
        }
    }

    #[must_use]
    pub fn evaluation_id(&self) -> &str {
        &self.evaluation_id
    }

    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        self.decision
    }

    #[must_use]
    pub fn is_execute(&self) -> bool {
        self.decision == GuardDecision::Execute
    }

    #[must_use]
    pub fn is_block(&self) -> bool {
        self.decision == GuardDecision::Block
    }

    #[must_use]
    pub fn trade_intent(&self) -> Option<&TradeIntent> {
        self.trade_intent.as_ref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.trade_intent.as_ref().map(|i| i.request_id.as_str())
    }

    #[must_use]
    pub fn reason(&self) -> Option<BlockReason> {
        self.reason
    }

    #[must_use]
    pub fn severity(&self) -> Option<BlockSeverity> {
        self.severity
    }

    #[must_use]
    pub fn category(&self) -> Option<BlockCategory> {
        self.category
    }

    #[must_use]
    pub fn details(&self) -> &Details {
        &self.details
    }

    #[must_use]
    pub fn validation_results(&self) -> &[ValidationResult] {
        &self.validation_results
    }

    #[must_use]
    pub fn evaluation_time_ms(&self) -> f64 {
        self.evaluation_time_ms
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Human-readable message from `details["message"]`, if any.
    pub fn message(&self) -> Option<&str> {
        self.details.get("message").and_then(Value::as_str)
    }

    fn symbol_and_direction(&self) -> (String, String) {
        match &self.trade_intent {
            Some(intent) => (intent.symbol.clone(), intent.direction.to_string()),
            None => ("UNKNOWN".to_string(), "UNKNOWN".to_string()),
        }
    }

    /// One-line summary for logs.
    pub fn format_summary(&self) -> String {
        let (symbol, direction) = self.symbol_and_direction();
        match (self.decision, self.reason, self.severity) {
            (GuardDecision::Block, Some(reason), Some(severity)) => format!(
                "BLOCK | {} {} | {} ({}) | {:.2}ms",
                symbol, direction, reason, severity, self.evaluation_time_ms
            ),
            _ => format!(
                "{} | {} {} | {:.2}ms",
                self.decision, symbol, direction, self.evaluation_time_ms
            ),
        }
    }

    /// Multi-line plain-text message describing a block.
    pub fn format_alert_message(&self) -> String {
        let (symbol, direction) = self.symbol_and_direction();
        let mut out = String::new();
        let _ = writeln!(out, "Trade Guard {}", self.decision);
        let _ = writeln!(out, "Symbol: {symbol}");
        let _ = writeln!(out, "Direction: {direction}");
        if let Some(reason) = self.reason {
            let _ = writeln!(out, "Reason: {reason}");
        }
        if let Some(category) = self.category {
            let _ = writeln!(out, "Category: {category}");
        }
        if let Some(severity) = self.severity {
            let _ = writeln!(out, "Severity: {severity}");
        }
        if let Some(message) = self.message() {
            let _ = writeln!(out, "Message: {message}");
        }
        let _ = writeln!(out, "Eval Time: {:.2}ms", self.evaluation_time_ms);
        let _ = writeln!(out, "Time: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = write!(out, "ID: {}", self.evaluation_id);
        out
    }
}
