//! Cache Engine Module
//!
//! Stale-while-revalidate orchestration over a pluggable storage adapter.
//!
//! A `get` serves fresh values straight from storage, serves stale values
//! while refreshing them on a background task, and falls back to awaiting the
//! producing function on a miss or after expiry. Concurrent callers for the
//! same key queue behind the in-flight revalidation instead of invoking the
//! producer again.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::config::{parse_config, CacheConfig, ConfigOverrides, ParsedConfig};
use crate::cache::emitter::{CacheEvent, Emitter};
use crate::cache::entry::{CacheEntry, CacheResponse, CacheStatus};
use crate::cache::inflight::{Claim, InFlightRegistry, MarkerId};
use crate::cache::key::{create_time_cache_key, get_cache_key, CacheKey};
use crate::error::{CacheError, Result, StorageError};

/// Source name carried by every event envelope of an engine.
pub const EVENT_SOURCE: &str = "swr-cache";

// == Swr Cache ==
/// Stale-while-revalidate cache engine. Cheap to clone; clones share storage
/// config, listeners and the in-flight registry.
#[derive(Clone, Debug)]
pub struct SwrCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Raw config, kept so per-call overrides can be merged and re-parsed
    config: CacheConfig,
    parsed: ParsedConfig,
    emitter: Emitter,
    in_flight: InFlightRegistry,
}

/// A stored value after the deserialize hook, with its write timestamp.
struct StoredValue {
    value: Value,
    cached_at: i64,
}

impl SwrCache {
    // == Constructor ==
    /// Creates an engine after validating `config`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let parsed = parse_config(&config)?;
        debug!(
            min_time_to_stale = parsed.min_time_to_stale,
            max_time_to_live = ?parsed.max_time_to_live,
            "SWR cache created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                parsed,
                emitter: Emitter::new(EVENT_SOURCE),
                in_flight: InFlightRegistry::new(),
            }),
        })
    }

    /// Event bus for subscribing to lifecycle events.
    pub fn emitter(&self) -> &Emitter {
        &self.inner.emitter
    }

    /// Resolved instance configuration.
    pub fn config(&self) -> &ParsedConfig {
        &self.inner.parsed
    }

    /// Whether a revalidation for `key` is currently marked in flight.
    pub fn is_in_flight(&self, key: impl Into<CacheKey>) -> bool {
        self.inner.in_flight.contains(&get_cache_key(&key.into()))
    }

    // == Get ==
    /// Returns the cached value for `key`, invoking `producer` when needed.
    ///
    /// - fresh: returned as is, `producer` not called
    /// - stale: returned as is, `producer` called on a background task
    /// - miss / expired: `producer` awaited (with retries) and its value returned
    ///
    /// # Errors
    /// Only a foreground revalidation failure (after retries) is returned.
    /// Storage read failures degrade to a miss; background failures surface
    /// only as `RevalidateFailed` events.
    pub async fn get<V, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        producer: F,
    ) -> Result<CacheResponse<V>>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let parsed = self.inner.parsed.clone();
        self.get_inner(key.into(), producer, parsed).await
    }

    /// Like `get`, with `overrides` merged onto the instance config for this
    /// call only.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` when the merged config does not validate.
    pub async fn get_with<V, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        producer: F,
        overrides: &ConfigOverrides,
    ) -> Result<CacheResponse<V>>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let parsed = parse_config(&self.inner.config.merged(overrides))?;
        self.get_inner(key.into(), producer, parsed).await
    }

    async fn get_inner<V, F, Fut>(
        &self,
        cache_key: CacheKey,
        producer: F,
        parsed: ParsedConfig,
    ) -> Result<CacheResponse<V>>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let inner = &self.inner;
        let key = get_cache_key(&cache_key);
        let time_key = create_time_cache_key(&key);

        inner.emit(CacheEvent::Invoke {
            cache_key: key.clone(),
        });

        // Re-claim after every wake: another waiter may have taken the key first
        let marker = loop {
            match inner.in_flight.claim(&key) {
                Claim::Acquired(marker) => break marker,
                Claim::InFlight(waiter) => {
                    inner.emit(CacheEvent::CacheInFlight {
                        cache_key: key.clone(),
                    });
                    debug!(cache_key = %key, "Revalidation in flight, waiting for it to settle");
                    waiter.wait().await;
                }
            }
        };
        let guard = SettleGuard {
            inner: inner.clone(),
            key: key.clone(),
            marker,
        };

        let now = parsed.clock.now_ms();

        let stored = match inner.read_stored(&parsed, &key, &time_key).await {
            Ok(stored) => stored,
            Err(err) => {
                inner.report_get_failed(&key, &err);
                None
            }
        };

        let mut status = CacheStatus::Miss;

        if let Some(StoredValue { value, cached_at }) = stored {
            let cached_age = now - cached_at;

            if is_expired(cached_age, parsed.max_time_to_live) {
                debug!(cache_key = %key, cached_age, "Cache EXPIRED");
                inner.emit(CacheEvent::CacheExpired {
                    cache_key: key.clone(),
                    cached_value: value,
                    cached_age,
                    cached_at,
                    max_time_to_live: parsed.max_time_to_live,
                });
                status = CacheStatus::Expired;
            } else {
                match serde_json::from_value::<V>(value.clone()) {
                    Ok(cached) => {
                        return Ok(self.serve_cached(
                            cached, value, cached_at, cached_age, now, producer, parsed, guard,
                        ));
                    }
                    Err(err) => inner.report_get_failed(&key, &err),
                }
            }
        }

        debug!(cache_key = %key, ?status, "Cache MISS, revalidating");
        inner.emit(CacheEvent::CacheMiss {
            cache_key: key.clone(),
        });

        let (value, cached_at) = inner.revalidate(&parsed, &key, &producer, guard).await?;

        Ok(CacheResponse::new(
            value,
            status,
            parsed.min_time_to_stale,
            parsed.max_time_to_live,
            now,
            cached_at,
        ))
    }

    /// Hit path: answers from the cached value, scheduling a background
    /// revalidation when it is stale.
    #[allow(clippy::too_many_arguments)]
    fn serve_cached<V, F, Fut>(
        &self,
        cached: V,
        raw: Value,
        cached_at: i64,
        cached_age: i64,
        now: i64,
        producer: F,
        parsed: ParsedConfig,
        guard: SettleGuard,
    ) -> CacheResponse<V>
    where
        V: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let inner = &self.inner;
        let key = guard.key.clone();

        inner.emit(CacheEvent::CacheHit {
            cache_key: key.clone(),
            cached_value: raw.clone(),
        });

        let min_time_to_stale = parsed.min_time_to_stale;
        let max_time_to_live = parsed.max_time_to_live;
        let stale_after = i64::try_from(min_time_to_stale).unwrap_or(i64::MAX);

        let status = if cached_age >= stale_after {
            debug!(cache_key = %key, cached_age, "Cache HIT (stale), revalidating in background");
            inner.emit(CacheEvent::CacheStale {
                cache_key: key.clone(),
                cached_value: raw,
                cached_age,
            });

            let task_inner = inner.clone();
            tokio::spawn(async move {
                // Failure already reported through RevalidateFailed
                let _ = task_inner
                    .revalidate(&parsed, &key, &producer, guard)
                    .await;
            });
            CacheStatus::Stale
        } else {
            debug!(cache_key = %key, cached_age, "Cache HIT (fresh)");
            drop(guard);
            CacheStatus::Fresh
        };

        CacheResponse::new(
            cached,
            status,
            min_time_to_stale,
            max_time_to_live,
            now,
            cached_at,
        )
    }

    // == Set ==
    /// Writes `value` with the current timestamp, bypassing any producer.
    ///
    /// # Errors
    /// Serialization or storage failures, after a `CacheSetFailed` event.
    pub async fn set<V: Serialize>(&self, key: impl Into<CacheKey>, value: &V) -> Result<()> {
        let parsed = &self.inner.parsed;
        let key = get_cache_key(&key.into());
        let now = parsed.clock.now_ms();
        let raw = serde_json::to_value(value).map_err(CacheError::from);
        self.inner.write(parsed, &key, raw, now).await
    }

    // == Remove ==
    /// Deletes the value and timestamp slots of `key`.
    ///
    /// # Errors
    /// - `CacheError::RemoveUnsupported` when the adapter cannot delete
    /// - `CacheError::Storage` on adapter failure, after a `CacheRemoveFailed` event
    pub async fn remove(&self, key: impl Into<CacheKey>) -> Result<()> {
        let inner = &self.inner;
        let storage = &inner.parsed.storage;
        let key = get_cache_key(&key.into());
        let time_key = create_time_cache_key(&key);

        let result = tokio::try_join!(storage.remove_item(&key), storage.remove_item(&time_key));

        match result {
            Ok(_) => {
                debug!(cache_key = %key, "Cache entry removed");
                Ok(())
            }
            Err(StorageError::RemoveUnsupported) => Err(CacheError::RemoveUnsupported),
            Err(err) => {
                warn!(cache_key = %key, error = %err, "Failed to remove cache entry");
                inner.emit(CacheEvent::CacheRemoveFailed {
                    cache_key: key,
                    error: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    // == Peek ==
    /// Reads what storage holds for `key` without invoking anything.
    ///
    /// # Errors
    /// Unlike `get`, read and decode failures are returned (after a
    /// `CacheGetFailed` event).
    pub async fn peek<V: DeserializeOwned>(&self, key: impl Into<CacheKey>) -> Result<CacheEntry<V>> {
        let inner = &self.inner;
        let parsed = &inner.parsed;
        let key = get_cache_key(&key.into());
        let time_key = create_time_cache_key(&key);
        let now = parsed.clock.now_ms();

        let stored = inner
            .read_stored(parsed, &key, &time_key)
            .await
            .and_then(|stored| match stored {
                Some(StoredValue { value, cached_at }) => {
                    let cached = serde_json::from_value::<V>(value)?;
                    Ok(Some((cached, cached_at)))
                }
                None => Ok(None),
            });

        match stored {
            Ok(Some((cached, cached_at))) => Ok(CacheEntry {
                cached_value: Some(cached),
                cached_age: now - cached_at,
                cached_at: Some(cached_at),
                now,
            }),
            Ok(None) => Ok(CacheEntry::absent(now)),
            Err(err) => {
                inner.report_get_failed(&key, &err);
                Err(err)
            }
        }
    }
}

impl Inner {
    fn emit(&self, event: CacheEvent) {
        self.emitter.emit(event);
    }

    fn report_get_failed(&self, key: &str, err: &dyn std::fmt::Display) {
        warn!(cache_key = %key, error = %err, "Failed to read cache entry");
        self.emit(CacheEvent::CacheGetFailed {
            cache_key: key.to_string(),
            error: err.to_string(),
        });
    }

    // == Read ==
    /// Reads value and timestamp concurrently. `Ok(None)` unless both exist.
    async fn read_stored(
        &self,
        parsed: &ParsedConfig,
        key: &str,
        time_key: &str,
    ) -> Result<Option<StoredValue>> {
        let storage = &parsed.storage;
        let (value, time) = tokio::try_join!(storage.get_item(key), storage.get_item(time_key))?;

        let (Some(value), Some(time)) = (value, time) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }

        let cached_at = parse_timestamp(&time).ok_or_else(|| {
            CacheError::Serialization(format!("invalid timestamp for '{}': {}", key, time))
        })?;

        // The hook only ever sees present values
        let value = (parsed.deserialize)(value)
            .map_err(|err| CacheError::Serialization(format!("{:#}", err)))?;

        Ok(Some(StoredValue { value, cached_at }))
    }

    // == Write ==
    /// Persists value and timestamp, reporting failure as `CacheSetFailed`.
    async fn write(
        &self,
        parsed: &ParsedConfig,
        key: &str,
        raw: Result<Value>,
        cached_at: i64,
    ) -> Result<()> {
        let result = match raw {
            Ok(raw) => self.try_write(parsed, key, raw, cached_at).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            warn!(cache_key = %key, error = %err, "Failed to write cache entry");
            self.emit(CacheEvent::CacheSetFailed {
                cache_key: key.to_string(),
                error: err.to_string(),
            });
        }
        result
    }

    async fn try_write(
        &self,
        parsed: &ParsedConfig,
        key: &str,
        raw: Value,
        cached_at: i64,
    ) -> Result<()> {
        let stored = (parsed.serialize)(raw.clone())
            .map_err(|err| CacheError::Serialization(format!("{:#}", err)))?;

        let time_key = create_time_cache_key(key);
        let storage = &parsed.storage;
        tokio::try_join!(
            storage.set_item(key, stored),
            storage.set_item(&time_key, Value::String(cached_at.to_string()))
        )?;

        self.emit(CacheEvent::CacheUpdated {
            cache_key: key.to_string(),
            cache_value: raw,
        });
        Ok(())
    }

    // == Revalidate ==
    /// Invokes the producer under the retry policy and persists its value.
    ///
    /// Returns the value and its write timestamp. `guard` holds the key's
    /// marker for the whole run and settles it when dropped, whatever the
    /// outcome.
    async fn revalidate<V, F, Fut>(
        &self,
        parsed: &ParsedConfig,
        key: &str,
        producer: &F,
        guard: SettleGuard,
    ) -> Result<(V, i64)>
    where
        V: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let _guard = guard;

        self.emit(CacheEvent::Revalidate {
            cache_key: key.to_string(),
        });

        let mut invocation_count: u32 = 0;
        loop {
            invocation_count += 1;

            match producer().await {
                Ok(value) => {
                    let cached_at = parsed.clock.now_ms();
                    let raw = serde_json::to_value(&value).map_err(CacheError::from);
                    // Reported through CacheSetFailed; the value is still returned
                    let _ = self.write(parsed, key, raw, cached_at).await;
                    return Ok((value, cached_at));
                }
                Err(error) => {
                    if parsed.should_retry(invocation_count, &error) {
                        let delay = parsed.delay_for(invocation_count);
                        debug!(
                            cache_key = %key,
                            attempt = invocation_count,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Producer failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    warn!(
                        cache_key = %key,
                        attempts = invocation_count,
                        error = %error,
                        "Revalidation failed"
                    );
                    self.emit(CacheEvent::RevalidateFailed {
                        cache_key: key.to_string(),
                        error: format!("{:#}", error),
                    });
                    return Err(CacheError::Producer(error));
                }
            }
        }
    }
}

// == Settle Guard ==
/// Clears the in-flight marker it owns and announces it when dropped, so a
/// finished, failed, cancelled or panicked revalidation always releases waiters.
struct SettleGuard {
    inner: Arc<Inner>,
    key: String,
    marker: MarkerId,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.inner.in_flight.settle(&self.key, self.marker);
        self.inner.emit(CacheEvent::CacheInFlightSettled {
            cache_key: self.key.clone(),
        });
    }
}

// == Utility Functions ==
fn is_expired(cached_age: i64, max_time_to_live: Option<u64>) -> bool {
    match max_time_to_live {
        Some(ttl) => cached_age > i64::try_from(ttl).unwrap_or(i64::MAX),
        None => false,
    }
}

/// Timestamps are written as strings; numbers are accepted too.
fn parse_timestamp(time: &Value) -> Option<i64> {
    match time {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
