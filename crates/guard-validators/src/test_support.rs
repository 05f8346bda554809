//! Healthy snapshot fixtures for validator unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use guard_core::{
    AccountState, Direction, EnvironmentalContext, ExecutionHealthMetrics, GlobalHaltState,
    GuardInput, SystemStateSnapshot, TradeIntent,
};
use rust_decimal_macros::dec;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Every section present, every check passing under the default config.
pub fn healthy_input() -> GuardInput {
    let now = now();
    GuardInput {
        trade_intent: Some(TradeIntent {
            request_id: "req-0001".to_string(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            requested_size: dec!(0.01),
            timestamp: now - Duration::seconds(1),
            strategy_id: Some("momentum-v1".to_string()),
        }),
        system_state: Some(SystemStateSnapshot {
            market_data_available: true,
            market_data_timestamp: now - Duration::seconds(2),
            symbol_coverage_pct: Some(100.0),
            feature_pipeline_synced: true,
            feature_pipeline_lag_seconds: Some(1.0),
            clock_drift_ms: Some(5.0),
            ntp_synced: true,
        }),
        execution_health: Some(ExecutionHealthMetrics {
            exchange_reachable: true,
            exchange_status: Some("OPERATIONAL".to_string()),
            exchange_latency_ms: Some(120.0),
            rate_limit_remaining: Some(900),
            rate_limit_utilization: Some(0.2),
            order_success_rate_1h: Some(0.99),
            order_failures_1h: Some(0),
            pending_order_count: Some(0),
            pending_cancellation_count: Some(0),
            unknown_order_count: Some(0),
            network_latency_ms: Some(50.0),
            connection_stable: Some(true),
        }),
        halt_state: Some(GlobalHaltState::default()),
        account_state: Some(AccountState {
            system_position_count: Some(1),
            exchange_position_count: Some(1),
            system_equity: Some(dec!(10000)),
            exchange_equity: Some(dec!(10000)),
            available_balance: Some(dec!(5000)),
            margin_mode: Some("CROSS".to_string()),
            margin_ratio: Some(0.2),
            last_sync_timestamp: Some(now - Duration::seconds(10)),
        }),
        environmental_context: Some(EnvironmentalContext {
            current_risk_level: Some("LOW".to_string()),
            risk_score: Some(0.2),
            escalation_level: Some(0),
            escalation_reason: None,
            circuit_breaker_active: false,
            circuit_breaker_triggered_at: None,
            volatility_regime: Some("NORMAL".to_string()),
            current_volatility: Some(0.02),
            liquidity_score: Some(0.8),
            current_spread_pct: Some(0.05),
            near_support: false,
            near_resistance: false,
        }),
    }
}
