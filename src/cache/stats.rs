//! Cache Statistics Module
//!
//! Tracks cache activity by listening to the engine's event stream.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::emitter::{CacheEvent, Emitter, Subscription, Topic};

// == Cache Stats ==
/// Counters derived from lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached values served (fresh or stale)
    pub hits: u64,
    /// Lookups that had to await the producer (includes expired)
    pub misses: u64,
    /// Hits served stale with a background revalidation
    pub stale: u64,
    /// Cached values discarded for exceeding their TTL
    pub expired: u64,
    /// Revalidations started
    pub revalidations: u64,
    /// Revalidations that exhausted their retries
    pub revalidate_failures: u64,
    /// Storage reads, writes or removals that failed
    pub storage_failures: u64,
    /// Successful writes
    pub updates: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record ==
    /// Updates the counters for one event.
    pub fn record(&mut self, event: &CacheEvent) {
        match event {
            CacheEvent::CacheHit { .. } => self.hits += 1,
            CacheEvent::CacheMiss { .. } => self.misses += 1,
            CacheEvent::CacheStale { .. } => self.stale += 1,
            CacheEvent::CacheExpired { .. } => self.expired += 1,
            CacheEvent::Revalidate { .. } => self.revalidations += 1,
            CacheEvent::RevalidateFailed { .. } => self.revalidate_failures += 1,
            CacheEvent::CacheGetFailed { .. }
            | CacheEvent::CacheSetFailed { .. }
            | CacheEvent::CacheRemoveFailed { .. } => self.storage_failures += 1,
            CacheEvent::CacheUpdated { .. } => self.updates += 1,
            CacheEvent::CacheInFlight { .. }
            | CacheEvent::CacheInFlightSettled { .. }
            | CacheEvent::Invoke { .. } => {}
        }
    }
}

// == Stats Collector ==
/// Keeps a running `CacheStats` for every event an emitter publishes.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    stats: Arc<Mutex<CacheStats>>,
    subscription: Subscription,
}

impl StatsCollector {
    /// Subscribes to all events of `emitter`.
    pub fn attach(emitter: &Emitter) -> Self {
        let stats = Arc::new(Mutex::new(CacheStats::new()));
        let sink = stats.clone();
        let subscription = emitter.on(Topic::All, move |envelope| {
            sink.lock().record(&envelope.payload);
        });

        Self {
            stats,
            subscription,
        }
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Stops collecting. Counters keep their last values.
    pub fn detach(&self) -> bool {
        self.subscription.unsubscribe()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> String {
        "k".to_string()
    }

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record(&CacheEvent::CacheHit {
            cache_key: key(),
            cached_value: json!(1),
        });
        stats.record(&CacheEvent::CacheMiss { cache_key: key() });
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_failures_are_grouped() {
        let mut stats = CacheStats::new();
        for event in [
            CacheEvent::CacheGetFailed {
                cache_key: key(),
                error: "a".into(),
            },
            CacheEvent::CacheSetFailed {
                cache_key: key(),
                error: "b".into(),
            },
            CacheEvent::CacheRemoveFailed {
                cache_key: key(),
                error: "c".into(),
            },
        ] {
            stats.record(&event);
        }
        assert_eq!(stats.storage_failures, 3);
    }

    #[test]
    fn test_collector_follows_emitter() {
        let emitter = Emitter::new("test");
        let collector = StatsCollector::attach(&emitter);

        emitter.emit(CacheEvent::CacheStale {
            cache_key: key(),
            cached_value: json!(1),
            cached_age: 10,
        });
        emitter.emit(CacheEvent::Revalidate { cache_key: key() });
        assert_eq!(collector.snapshot().stale, 1);
        assert_eq!(collector.snapshot().revalidations, 1);

        assert!(collector.detach());
        emitter.emit(CacheEvent::Revalidate { cache_key: key() });
        assert_eq!(collector.snapshot().revalidations, 1);
    }
}
