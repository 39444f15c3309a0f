use crate::storage::Sample;
use chrono::{DateTime, Utc};

/// Per-second rate of a monotonic counter since `previous`.
///
/// Returns `None` without a previous sample or when no time has passed.
/// A counter that went backwards is assumed to have restarted from zero, so
/// the whole current value counts as the delta.
pub fn rate(current_raw: f64, previous: Option<&Sample>, now: DateTime<Utc>) -> Option<f64> {
    let previous = previous?;

    let elapsed = (now - previous.timestamp).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return None;
    }

    let delta = if current_raw < previous.raw_value {
        current_raw
    } else {
        current_raw - previous.raw_value
    };

    Some(round2(delta / elapsed))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
