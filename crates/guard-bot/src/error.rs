//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Guard configuration error: {0}")]
    Guard(#[from] guard_core::CoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] guard_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] guard_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] guard_persistence::PersistenceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
