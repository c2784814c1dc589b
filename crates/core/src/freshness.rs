//! TTL freshness evaluation.

use crate::cache::CachedEntry;

/// Whether `entry` is still within `ttl_ms` of its `stored-at` stamp at `now_ms`.
///
/// A TTL of zero is never fresh, even for entries stamped in the future.
pub fn is_fresh(entry: &CachedEntry, ttl_ms: u64, now_ms: i64) -> bool {
    if ttl_ms == 0 {
        return false;
    }
    let age = i128::from(now_ms) - i128::from(entry.stored_at());
    age < i128::from(ttl_ms)
}
