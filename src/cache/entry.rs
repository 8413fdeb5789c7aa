//! Cache Entry Module
//!
//! Result types returned by the engine: the raw read of a stored entry and
//! the public response of `get`.

use serde::Serialize;

// == Cache Status ==
/// How a `get` was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Cached value younger than the staleness threshold
    Fresh,
    /// Cached value served while a background revalidation runs
    Stale,
    /// Cached value was past its TTL; the producer supplied a new one
    Expired,
    /// Nothing cached; the producer supplied the value
    Miss,
}

// == Cache Entry ==
/// Read-only view of what storage holds for a key, as returned by `peek`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry<V> {
    /// Stored value, `None` when absent
    pub cached_value: Option<V>,
    /// Milliseconds since the value was written, 0 when absent
    pub cached_age: i64,
    /// Write timestamp (Unix milliseconds)
    pub cached_at: Option<i64>,
    /// Clock reading used for this read (Unix milliseconds)
    pub now: i64,
}

impl<V> CacheEntry<V> {
    /// Entry describing an absent key.
    pub fn absent(now: i64) -> Self {
        Self {
            cached_value: None,
            cached_age: 0,
            cached_at: None,
            now,
        }
    }

    pub fn is_present(&self) -> bool {
        self.cached_value.is_some()
    }
}

// == Cache Response ==
/// Public result of `get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheResponse<V> {
    pub value: V,
    pub status: CacheStatus,
    pub min_time_to_stale: u64,
    /// `None` when values never expire
    pub max_time_to_live: Option<u64>,
    pub now: i64,
    pub cached_at: i64,
    /// `cached_at + max_time_to_live`, `None` when values never expire
    pub expire_at: Option<i64>,
    /// `cached_at + min_time_to_stale`
    pub stale_at: i64,
}

impl<V> CacheResponse<V> {
    // == Constructor ==
    /// Builds a response, deriving `expire_at` and `stale_at` from `cached_at`.
    pub fn new(
        value: V,
        status: CacheStatus,
        min_time_to_stale: u64,
        max_time_to_live: Option<u64>,
        now: i64,
        cached_at: i64,
    ) -> Self {
        Self {
            value,
            status,
            min_time_to_stale,
            max_time_to_live,
            now,
            cached_at,
            expire_at: max_time_to_live.map(|ttl| cached_at.saturating_add(to_i64(ttl))),
            stale_at: cached_at.saturating_add(to_i64(min_time_to_stale)),
        }
    }
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_derives_deadlines() {
        let resp = CacheResponse::new("v", CacheStatus::Fresh, 1_000, Some(5_000), 10_500, 10_000);

        assert_eq!(resp.stale_at, 11_000);
        assert_eq!(resp.expire_at, Some(15_000));
    }

    #[test]
    fn test_response_without_ttl_never_expires() {
        let resp = CacheResponse::new(1, CacheStatus::Miss, 0, None, 10, 10);

        assert_eq!(resp.expire_at, None);
        assert_eq!(resp.stale_at, 10);
    }

    #[test]
    fn test_absent_entry() {
        let entry: CacheEntry<String> = CacheEntry::absent(42);

        assert!(!entry.is_present());
        assert_eq!(entry.cached_age, 0);
        assert_eq!(entry.now, 42);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&CacheStatus::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
    }
}
