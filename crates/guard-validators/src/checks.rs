//! Boundary-check helpers shared by the validators.
//!
//! Ceilings block when the value is strictly greater than the limit, floors
//! when it is strictly below. A value that cannot be compared (NaN) counts
//! as a violation in both directions.

use chrono::{DateTime, Utc};
use guard_core::Details;
use serde_json::Value;

/// `value > limit`, with NaN treated as exceeding.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn exceeds<T: PartialOrd>(value: T, limit: T) -> bool {
    !(value <= limit)
}

/// `value < limit`, with NaN treated as below.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn below<T: PartialOrd>(value: T, limit: T) -> bool {
    !(value >= limit)
}

/// Case-insensitive membership test.
pub fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Seconds from `then` to `now`. Negative when `then` is in the future.
pub fn age_seconds(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 1000.0
}

/// Convert a `json!` object into `Details`.
pub fn details(value: Value) -> Details {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Details::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
