//! Block alerting for the trade guard.
//!
//! `GuardAlerter` turns BLOCK decisions into `GuardAlert`s, applies the
//! alerting policy and rate limits, formats the text and hands it to an
//! `AlertSender`. Every path ends in an `AlertOutcome`; nothing here can
//! change a decision.

pub mod alert;
pub mod alerter;
pub mod error;
pub mod formatter;
pub mod rate_limiter;

pub use alert::{GuardAlert, TRADE_BLOCKED};
pub use alerter::{AlertOutcome, AlertSender, GuardAlerter, LogAlertSender, SkipReason};
#[cfg(any(test, feature = "mock"))]
pub use alerter::MockAlertSender;
pub use error::{AlertError, AlertResult};
pub use formatter::{format_alert, severity_marker};
pub use rate_limiter::{AlertRateLimiter, RateLimitExceeded};
