//! Data freshness, clock sanity and replay protection.
//!
//! Check order: duplicate request, request timestamp, market data, feature
//! pipeline, clock. The duplicate check runs first so that every request id
//! reaching this validator is recorded, even if a later check blocks it.

use crate::checks::{age_seconds, below, details, exceeds};
use crate::duplicate::DuplicateRequestCache;
use crate::error::{CheckFailure, CheckResult};
use crate::validator::{Validator, ValidatorMeta};
use chrono::{DateTime, Utc};
use guard_core::{
    BlockCategory, BlockReason, BlockSeverity, Details, GuardSections, SystemIntegrityConfig,
    SystemStateSnapshot, TradeIntent,
};
use serde_json::json;
use std::sync::Arc;

pub struct SystemIntegrityValidator {
    config: SystemIntegrityConfig,
    cache: Arc<DuplicateRequestCache>,
}

impl SystemIntegrityValidator {
    pub const META: ValidatorMeta = ValidatorMeta {
        name: "SystemIntegrityValidator",
        category: BlockCategory::SystemIntegrity,
        description: "Replay, request age, market data, feature pipeline and clock checks",
        is_critical: true,
    };

    /// `cache` is shared with the owner so it can be inspected or cleared.
    pub fn new(config: SystemIntegrityConfig, cache: Arc<DuplicateRequestCache>) -> Self {
        Self { config, cache }
    }

    fn check_duplicate(&self, intent: &TradeIntent, now: DateTime<Utc>) -> CheckResult {
        self.cache
            .check_and_record(&intent.request_id, now)
            .map_err(|first_seen| {
                CheckFailure::new(
                    BlockReason::SiDuplicateRequest,
                    BlockSeverity::High,
                    format!("Duplicate request: {}", intent.request_id),
                )
                .with("request_id", &intent.request_id)
                .with("first_seen", first_seen)
                .with("window_seconds", self.config.duplicate_window_seconds)
            })
    }

    fn check_request_timestamp(&self, intent: &TradeIntent, now: DateTime<Utc>) -> CheckResult {
        let age = age_seconds(now, intent.timestamp);
        if exceeds(age, self.config.max_request_age_seconds) {
            return Err(CheckFailure::new(
                BlockReason::SiTimestampInconsistency,
                BlockSeverity::Medium,
                format!("Request too old: {age:.1}s"),
            )
            .with("request_age_seconds", age)
            .with("max_age_seconds", self.config.max_request_age_seconds));
        }
        if below(age, -self.config.max_future_timestamp_seconds) {
            return Err(CheckFailure::new(
                BlockReason::SiClockDrift,
                BlockSeverity::High,
                format!("Request timestamp {:.1}s in the future", -age),
            )
            .with("request_age_seconds", age)
            .with("max_future_seconds", self.config.max_future_timestamp_seconds));
        }
        Ok(())
    }

    fn check_market_data(&self, system: &SystemStateSnapshot, now: DateTime<Utc>) -> CheckResult {
        if !system.market_data_available {
            return Err(CheckFailure::new(
                BlockReason::SiMissingMarketData,
                BlockSeverity::Critical,
                "Market data unavailable",
            ));
        }

        let age = age_seconds(now, system.market_data_timestamp);
        if exceeds(age, self.config.max_market_data_age_seconds) {
            return Err(CheckFailure::new(
                BlockReason::SiStaleMarketData,
                BlockSeverity::High,
                format!("Market data stale: {age:.1}s old"),
            )
            .with("data_age_seconds", age)
            .with("max_age_seconds", self.config.max_market_data_age_seconds));
        }

        if let Some(coverage) = system.symbol_coverage_pct {
            if below(coverage, self.config.min_symbol_coverage_pct) {
                return Err(CheckFailure::new(
                    BlockReason::SiMissingMarketData,
                    BlockSeverity::High,
                    format!("Symbol coverage too low: {coverage:.1}%"),
                )
                .with("coverage_pct", coverage)
                .with("min_coverage_pct", self.config.min_symbol_coverage_pct));
            }
        }
        Ok(())
    }

    fn check_feature_pipeline(&self, system: &SystemStateSnapshot) -> CheckResult {
        if !self.config.require_feature_sync {
            return Ok(());
        }
        if !system.feature_pipeline_synced {
            return Err(CheckFailure::new(
                BlockReason::SiFeaturePipelineDesync,
                BlockSeverity::High,
                "Feature pipeline not synced",
            ));
        }
        if let Some(lag) = system.feature_pipeline_lag_seconds {
            if exceeds(lag, self.config.max_feature_pipeline_lag_seconds) {
                return Err(CheckFailure::new(
                    BlockReason::SiFeaturePipelineDesync,
                    BlockSeverity::High,
                    format!("Feature pipeline lag: {lag:.1}s"),
                )
                .with("lag_seconds", lag)
                .with("max_lag_seconds", self.config.max_feature_pipeline_lag_seconds));
            }
        }
        Ok(())
    }

    fn check_clock(&self, system: &SystemStateSnapshot) -> CheckResult {
        if !self.config.require_ntp_sync {
            return Ok(());
        }
        if !system.ntp_synced {
            return Err(CheckFailure::new(
                BlockReason::SiClockDrift,
                BlockSeverity::High,
                "NTP not synced",
            ));
        }
        if let Some(drift) = system.clock_drift_ms {
            if exceeds(drift.abs(), self.config.max_clock_drift_ms) {
                return Err(CheckFailure::new(
                    BlockReason::SiClockDrift,
                    BlockSeverity::High,
                    format!("Clock drift: {drift:.0}ms"),
                )
                .with("drift_ms", drift)
                .with("max_drift_ms", self.config.max_clock_drift_ms));
            }
        }
        Ok(())
    }
}

impl Validator for SystemIntegrityValidator {
    fn meta(&self) -> ValidatorMeta {
        Self::META
    }

    fn check(&self, s: &GuardSections<'_>, now: DateTime<Utc>) -> CheckResult<Details> {
        self.check_duplicate(s.intent, now)?;
        self.check_request_timestamp(s.intent, now)?;
        self.check_market_data(s.system, now)?;
        self.check_feature_pipeline(s.system)?;
        self.check_clock(s.system)?;

        Ok(details(json!({
            "market_data_age_seconds": age_seconds(now, s.system.market_data_timestamp),
            "request_age_seconds": age_seconds(now, s.intent.timestamp),
            "feature_pipeline_synced": s.system.feature_pipeline_synced,
            "ntp_synced": s.system.ntp_synced,
        })))
    }
}
