//! Trade guard validators.
//!
//! Five validators, each a fixed-order chain of sub-checks that stops at the
//! first failure:
//! - `RuleValidator`: halts, locks, maintenance, hours, cooldown, symbol, direction
//! - `SystemIntegrityValidator`: replay, request age, market data, pipeline, clock
//! - `ExecutionSafetyValidator`: exchange health and pending order work
//! - `StateConsistencyValidator`: system versus exchange reconciliation
//! - `EnvironmentValidator`: risk, escalation, circuit breaker, volatility, liquidity
//!
//! The engine runs them in that order.

pub mod checks;
pub mod duplicate;
pub mod environment;
pub mod error;
pub mod execution_safety;
pub mod rule;
pub mod state_consistency;
pub mod system_integrity;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use duplicate::DuplicateRequestCache;
pub use environment::EnvironmentValidator;
pub use error::{CheckFailure, CheckResult};
pub use execution_safety::ExecutionSafetyValidator;
pub use rule::RuleValidator;
pub use state_consistency::StateConsistencyValidator;
pub use system_integrity::SystemIntegrityValidator;
pub use validator::{Validator, ValidatorMeta};
