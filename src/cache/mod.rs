//! Cache Module
//!
//! Stale-while-revalidate engine and the pieces it is built from: key
//! normalization, config parsing, the event emitter and the in-flight registry.

mod clock;
mod config;
mod emitter;
mod engine;
mod entry;
mod inflight;
mod key;
mod stats;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use config::{
    exponential_backoff, parse_config, CacheConfig, ConfigOverrides, ParsedConfig, Retry,
    RetryDelay, RetryDelayFn, RetryPredicate, ValueHook, MAX_SAFE_INTEGER,
};
pub use emitter::{
    CacheEvent, Emitter, EventEnvelope, EventType, Listener, ListenerId, Subscription, Topic,
};
pub use engine::{SwrCache, EVENT_SOURCE};
pub use entry::{CacheEntry, CacheResponse, CacheStatus};
pub use inflight::{Claim, InFlightRegistry, MarkerId, Waiter};
pub use key::{create_time_cache_key, get_cache_key, CacheKey, KeyPart, TIME_KEY_SUFFIX};
pub use stats::{CacheStats, StatsCollector};
