//! Single source of truth for "now", expressed in epoch milliseconds —
//! every round timestamp, cooldown, and reconnection deadline is computed
//! against this.

use jiff::Timestamp;

pub fn now_ms() -> i64 {
    Timestamp::now().as_millisecond()
}
