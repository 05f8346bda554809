//! Engine error types.
//!
//! Evaluation itself never fails: every fault becomes a BLOCK decision.
//! Errors here are construction-time only.

use guard_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid guard configuration: {0}")]
    Config(#[from] CoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
