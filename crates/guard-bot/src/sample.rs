//! Built-in sample inputs for the `demo` subcommand.

use chrono::{DateTime, Duration, Utc};
use guard_core::{
    AccountState, Direction, EnvironmentalContext, ExecutionHealthMetrics, GlobalHaltState,
    GuardInput, SystemStateSnapshot, TradeIntent,
};
use rust_decimal::Decimal;

/// Fully healthy snapshot as seen at `now`.
pub fn healthy(now: DateTime<Utc>, request_id: &str) -> GuardInput {
    GuardInput {
        trade_intent: Some(TradeIntent {
            request_id: request_id.to_string(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            requested_size: Decimal::new(1, 2),
            timestamp: now,
            strategy_id: Some("demo".to_string()),
        }),
        system_state: Some(SystemStateSnapshot {
            market_data_available: true,
            market_data_timestamp: now - Duration::seconds(1),
            symbol_coverage_pct: Some(100.0),
            feature_pipeline_synced: true,
            feature_pipeline_lag_seconds: Some(0.5),
            clock_drift_ms: Some(3.0),
            ntp_synced: true,
        }),
        execution_health: Some(ExecutionHealthMetrics {
            exchange_reachable: true,
            exchange_status: Some("OPERATIONAL".to_string()),
            exchange_latency_ms: Some(80.0),
            rate_limit_remaining: Some(1000),
            rate_limit_utilization: Some(0.1),
            order_success_rate_1h: Some(1.0),
            order_failures_1h: Some(0),
            pending_order_count: Some(0),
            pending_cancellation_count: Some(0),
            unknown_order_count: Some(0),
            network_latency_ms: Some(40.0),
            connection_stable: Some(true),
        }),
        halt_state: Some(GlobalHaltState::default()),
        account_state: Some(AccountState {
            system_position_count: Some(0),
            exchange_position_count: Some(0),
            system_equity: Some(Decimal::from(25_000)),
            exchange_equity: Some(Decimal::from(25_000)),
            available_balance: Some(Decimal::from(20_000)),
            margin_mode: Some("CROSS".to_string()),
            margin_ratio: Some(0.1),
            last_sync_timestamp: Some(now - Duration::seconds(5)),
        }),
        environmental_context: Some(EnvironmentalContext {
            current_risk_level: Some("LOW".to_string()),
            risk_score: Some(0.1),
            escalation_level: Some(0),
            volatility_regime: Some("NORMAL".to_string()),
            current_volatility: Some(0.015),
            liquidity_score: Some(0.9),
            current_spread_pct: Some(0.02),
            ..EnvironmentalContext::default()
        }),
    }
}

/// Healthy except for an active global halt.
pub fn halted(now: DateTime<Utc>, request_id: &str) -> GuardInput {
    let mut input = healthy(now, request_id);
    input.halt_state = Some(GlobalHaltState {
        is_halted: true,
        halt_reason: Some("Operator halt".to_string()),
        halt_timestamp: Some(now - Duration::minutes(2)),
        ..GlobalHaltState::default()
    });
    input
}
