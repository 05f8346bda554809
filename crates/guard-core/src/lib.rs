//! Core domain types for the trade guard.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `GuardDecision`, `BlockReason`, `BlockCategory`, `BlockSeverity`: the taxonomy
//! - `GuardInput` and its six snapshot sections
//! - `ValidationResult`, `GuardDecisionOutput`: what an evaluation produces
//! - `TradeGuardConfig` and presets
//! - `Clock`: the single source of "now" for an evaluation

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod result;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AlertingConfig, ConfigPreset, EnvironmentalConfig, ExecutionSafetyConfig, RuleConfig,
    StateConsistencyConfig, SystemIntegrityConfig, TimingConfig, TradeGuardConfig, TradingWindow,
    MAX_WINDOW_SECONDS,
};
pub use decision::{BlockCategory, BlockReason, BlockSeverity, GuardDecision};
pub use error::{CoreError, Result};
pub use result::{evaluation_id, Details, GuardDecisionOutput, ValidationResult};
pub use snapshot::{
    AccountState, Direction, EnvironmentalContext, ExecutionHealthMetrics, GlobalHaltState,
    GuardInput, GuardSections, SystemStateSnapshot, TradeIntent,
};
