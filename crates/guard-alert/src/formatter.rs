//! Plain-text rendering of alerts.

use crate::alert::GuardAlert;
use guard_core::BlockSeverity;
use std::fmt::Write as _;

/// Leading marker so severities are distinguishable at a glance.
pub fn severity_marker(severity: BlockSeverity) -> &'static str {
    match severity {
        BlockSeverity::Low => "ℹ️",
        BlockSeverity::Medium => "⚠️",
        BlockSeverity::High => "🟠",
        BlockSeverity::Critical => "🔴",
        BlockSeverity::Emergency => "🚨",
    }
}

pub fn format_alert(alert: &GuardAlert) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", severity_marker(alert.severity), alert.title);
    let _ = writeln!(out, "Decision: BLOCK");
    let _ = writeln!(out, "Symbol: {}", alert.symbol);
    let _ = writeln!(out, "Direction: {}", alert.direction);
    let _ = writeln!(out, "Reason: {}", alert.reason);
    let _ = writeln!(out, "Category: {}", alert.category);
    let _ = writeln!(out, "Severity: {}", alert.severity);
    let _ = writeln!(out, "Message: {}", alert.message);
    let _ = writeln!(out, "Eval Time: {:.2}ms", alert.evaluation_time_ms);
    let _ = writeln!(out, "Time: {}", alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = write!(out, "ID: {}", alert.evaluation_id);
    out
}
