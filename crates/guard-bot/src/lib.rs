//! Trade guard operator binary.
//!
//! Loads `AppConfig`, builds the guard pipeline with a journal and the log
//! alert sender, and evaluates inputs from files or stdin.

pub mod app;
pub mod config;
pub mod error;
pub mod sample;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
