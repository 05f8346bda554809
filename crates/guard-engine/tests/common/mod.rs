//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use guard_core::{
    AccountState, Direction, EnvironmentalContext, ExecutionHealthMetrics, GlobalHaltState,
    GuardInput, ManualClock, SystemStateSnapshot, TradeGuardConfig, TradeIntent,
};
use guard_engine::TradeGuard;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub fn guard(config: TradeGuardConfig, clock: &Arc<ManualClock>) -> TradeGuard {
    TradeGuard::with_clock(config, clock.clone()).unwrap()
}

/// A request id not used by any other test in this binary.
pub fn unique_request_id() -> String {
    format!("req-{:06}", NEXT_REQUEST.fetch_add(1, Ordering::Relaxed))
}

/// Every section present and healthy as seen at `now`.
pub fn healthy_input_at(now: DateTime<Utc>, request_id: &str) -> GuardInput {
    GuardInput {
        trade_intent: Some(TradeIntent {
            request_id: request_id.to_string(),
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

/// Healthy input at `t0()` with a fresh request id.
pub fn healthy_input() -> GuardInput {
    healthy_input_at(t0(), &unique_request_id())
}
