//! Fail-closed trade authorization.
//!
//! `TradeGuard` runs the validators in fixed order under a total time
//! budget and converts any fault into a BLOCK. `GuardPipeline` adds the
//! audit trail and block alerts on top.
//!
//! ```ignore
//! let guard = TradeGuard::new(TradeGuardConfig::default())?;
//! let output = guard.evaluate(&input);
//! if output.is_execute() {
//!     // place the order
//! }
//! ```

pub mod engine;
pub mod error;
pub mod pipeline;

pub use engine::{
    default_validators, GuardHealth, TradeGuard, INPUT_CHECK_VALIDATOR, TOTAL_TIMEOUT_VALIDATOR,
};
pub use error::{EngineError, EngineResult};
pub use pipeline::GuardPipeline;
