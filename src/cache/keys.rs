use std::time::Duration;

/// Pending-reward flags are short-lived; an unclaimed flag expires rather
/// than paying out a stale milestone weeks later.
pub const REVIEW_WRITTEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn review_written_key(user_id: i64) -> String {
    format!("review:written:{}", user_id)
}
