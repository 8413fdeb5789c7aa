//! Cache Config Module
//!
//! Validates and defaults the cache tunables into a fully resolved
//! `ParsedConfig`. The same parser handles the instance config and the
//! per-call overrides merged onto it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::storage::Storage;

// == Public Constants ==
/// Largest integer a millisecond setting is clamped to (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Base of the default exponential retry backoff, in milliseconds.
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;

/// Ceiling of the default exponential retry backoff, in milliseconds.
pub const DEFAULT_RETRY_MAX_MS: u64 = 30_000;

// == Hook Types ==
pub type RetryPredicate = Arc<dyn Fn(u32, &anyhow::Error) -> bool + Send + Sync>;
pub type RetryDelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
pub type ValueHook = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

// == Retry ==
/// How failed producer invocations are retried.
#[derive(Clone, Default)]
pub enum Retry {
    /// Never retry.
    #[default]
    Never,
    /// Retry while the failure count is at most `n`.
    Count(u32),
    /// Retry while the predicate returns true for `(failure_count, error)`.
    Predicate(RetryPredicate),
}

impl Retry {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(u32, &anyhow::Error) -> bool + Send + Sync + 'static,
    {
        Retry::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retry::Never => f.write_str("Never"),
            Retry::Count(n) => write!(f, "Count({})", n),
            Retry::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// == Retry Delay ==
/// Delay before the next attempt, given the number of attempts made so far.
#[derive(Clone, Default)]
pub enum RetryDelay {
    /// `min(1000 * 2^attempt, 30000)` ms.
    #[default]
    Exponential,
    /// A constant delay in milliseconds.
    Fixed(u64),
    Custom(RetryDelayFn),
}

impl RetryDelay {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryDelay::Custom(Arc::new(f))
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Exponential => f.write_str("Exponential"),
            RetryDelay::Fixed(ms) => write!(f, "Fixed({})", ms),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Default backoff: doubles per attempt, capped at 30 seconds.
pub fn exponential_backoff(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(DEFAULT_RETRY_BASE_MS))
        .map_or(DEFAULT_RETRY_MAX_MS, |ms| ms.min(DEFAULT_RETRY_MAX_MS));
    Duration::from_millis(ms)
}

// == Cache Config ==
/// Raw cache configuration as supplied by the caller.
///
/// Unset fields take their defaults in `parse_config`.
#[derive(Clone, Default)]
pub struct CacheConfig {
    /// Storage adapter; required
    pub storage: Option<Arc<dyn Storage>>,
    /// Age in ms after which a cached value is stale (default 0)
    pub min_time_to_stale: Option<u64>,
    /// Age in ms after which a cached value is expired; `None` or 0 means never
    pub max_time_to_live: Option<u64>,
    pub retry: Retry,
    pub retry_delay: RetryDelay,
    /// Applied to values before they are written (default identity)
    pub serialize: Option<ValueHook>,
    /// Applied to values after they are read (default identity)
    pub deserialize: Option<ValueHook>,
    /// Time source (default system clock)
    pub clock: Option<Arc<dyn Clock>>,
}

impl CacheConfig {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::default()
        }
    }

    pub fn min_time_to_stale(mut self, ms: u64) -> Self {
        self.min_time_to_stale = Some(ms);
        self
    }

    pub fn max_time_to_live(mut self, ms: u64) -> Self {
        self.max_time_to_live = Some(ms);
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn serialize<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    pub fn deserialize<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.deserialize = Some(Arc::new(f));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Returns a copy with every field set in `overrides` replacing its own.
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(storage) = &overrides.storage {
            merged.storage = Some(storage.clone());
        }
        if let Some(ms) = overrides.min_time_to_stale {
            merged.min_time_to_stale = Some(ms);
        }
        if let Some(ms) = overrides.max_time_to_live {
            merged.max_time_to_live = Some(ms);
        }
        if let Some(retry) = &overrides.retry {
            merged.retry = retry.clone();
        }
        if let Some(delay) = &overrides.retry_delay {
            merged.retry_delay = delay.clone();
        }
        if let Some(hook) = &overrides.serialize {
            merged.serialize = Some(hook.clone());
        }
        if let Some(hook) = &overrides.deserialize {
            merged.deserialize = Some(hook.clone());
        }
        merged
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("storage", &self.storage.is_some())
            .field("min_time_to_stale", &self.min_time_to_stale)
            .field("max_time_to_live", &self.max_time_to_live)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

// == Config Overrides ==
/// Per-call overrides for `SwrCache::get_with`. Only set fields apply.
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub storage: Option<Arc<dyn Storage>>,
    pub min_time_to_stale: Option<u64>,
    pub max_time_to_live: Option<u64>,
    pub retry: Option<Retry>,
    pub retry_delay: Option<RetryDelay>,
    pub serialize: Option<ValueHook>,
    pub deserialize: Option<ValueHook>,
}

impl ConfigOverrides {
    pub fn min_time_to_stale(mut self, ms: u64) -> Self {
        self.min_time_to_stale = Some(ms);
        self
    }

    pub fn max_time_to_live(mut self, ms: u64) -> Self {
        self.max_time_to_live = Some(ms);
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }
}

// == Parsed Config ==
/// Fully resolved configuration the engine runs with.
#[derive(Clone)]
pub struct ParsedConfig {
    pub storage: Arc<dyn Storage>,
    pub min_time_to_stale: u64,
    /// `None` means cached values never expire.
    pub max_time_to_live: Option<u64>,
    pub retry: RetryPredicate,
    pub retry_delay: RetryDelayFn,
    pub serialize: ValueHook,
    pub deserialize: ValueHook,
    pub clock: Arc<dyn Clock>,
}

impl ParsedConfig {
    /// Whether a failed attempt should be retried.
    pub fn should_retry(&self, failure_count: u32, error: &anyhow::Error) -> bool {
        (self.retry)(failure_count, error)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.retry_delay)(attempt)
    }
}

impl fmt::Debug for ParsedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedConfig")
            .field("min_time_to_stale", &self.min_time_to_stale)
            .field("max_time_to_live", &self.max_time_to_live)
            .finish_non_exhaustive()
    }
}

fn identity_hook(value: Value) -> anyhow::Result<Value> {
    Ok(value)
}

// == Parse ==
/// Validates `config` and fills in defaults.
///
/// # Errors
/// `CacheError::InvalidConfig` when no storage is given or when
/// `min_time_to_stale >= max_time_to_live`.
pub fn parse_config(config: &CacheConfig) -> Result<ParsedConfig> {
    let storage = config
        .storage
        .clone()
        .ok_or_else(|| CacheError::InvalidConfig("storage is required".to_string()))?;

    let min_time_to_stale = config.min_time_to_stale.unwrap_or(0).min(MAX_SAFE_INTEGER);

    // Zero is falsy and means "never expire", like an unset value
    let max_time_to_live = config
        .max_time_to_live
        .filter(|ms| *ms > 0)
        .map(|ms| ms.min(MAX_SAFE_INTEGER));

    if let Some(ttl) = max_time_to_live {
        if min_time_to_stale >= ttl {
            return Err(CacheError::InvalidConfig(format!(
                "min_time_to_stale ({}) must be less than max_time_to_live ({})",
                min_time_to_stale, ttl
            )));
        }
    }

    let retry: RetryPredicate = match &config.retry {
        Retry::Never => Arc::new(|_: u32, _: &anyhow::Error| false),
        Retry::Count(max) => {
            let max = *max;
            Arc::new(move |failure_count: u32, _: &anyhow::Error| failure_count <= max)
        }
        Retry::Predicate(f) => f.clone(),
    };

    let retry_delay: RetryDelayFn = match &config.retry_delay {
        RetryDelay::Exponential => Arc::new(exponential_backoff),
        RetryDelay::Fixed(ms) => {
            let delay = Duration::from_millis(*ms);
            Arc::new(move |_: u32| delay)
        }
        RetryDelay::Custom(f) => f.clone(),
    };

    let identity: ValueHook = Arc::new(identity_hook);

    Ok(ParsedConfig {
        storage,
        min_time_to_stale,
        max_time_to_live,
        retry,
        retry_delay,
        serialize: config.serialize.clone().unwrap_or_else(|| identity.clone()),
        deserialize: config.deserialize.clone().unwrap_or(identity),
        clock: config
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(SystemClock)),
    })
}
