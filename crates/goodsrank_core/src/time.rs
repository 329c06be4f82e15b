//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in epoch milliseconds. Clamps a pre-epoch clock to zero.
pub fn now_epoch_ms() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
