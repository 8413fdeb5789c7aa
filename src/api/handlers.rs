//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::api::OriginClient;
use crate::cache::{StatsCollector, SwrCache};
use crate::config::ServerConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, PeekResponse, SetRequest, SetResponse,
    StatsResponse,
};
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// SWR engine over the configured storage
    pub cache: SwrCache,
    /// Counters fed by the engine's event stream
    pub stats: StatsCollector,
    /// Upstream values are fetched from; `None` makes every fetch fail
    pub origin: Option<OriginClient>,
}

impl AppState {
    /// Creates a new AppState around an engine.
    pub fn new(cache: SwrCache, origin: Option<OriginClient>) -> Self {
        let stats = StatsCollector::attach(cache.emitter());
        Self {
            cache,
            stats,
            origin,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens file storage when a directory is configured, memory otherwise.
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::open(dir.clone()).await?),
            None => Arc::new(MemoryStorage::new()),
        };

        let cache = SwrCache::new(config.cache_config(storage))?;
        let origin = config.origin_url.as_deref().map(OriginClient::new);
        Ok(Self::new(cache, origin))
    }
}

/// Handler for GET /get/:key
///
/// Serves the cached value; a miss, expiry or staleness fetches from the origin.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let origin = state.origin.clone();
    let origin_key = key.clone();

    let response = state
        .cache
        .get(key.as_str(), move || {
            let origin = origin.clone();
            let origin_key = origin_key.clone();
            async move {
                match origin {
                    Some(origin) => origin.fetch(&origin_key).await,
                    None => Err(anyhow!("no origin configured")),
                }
            }
        })
        .await?;

    Ok(Json(GetResponse::new(key, response)))
}

/// Handler for PUT /set
///
/// Stores a value directly, bypassing the origin.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(req.key.as_str(), &req.value).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /peek/:key
///
/// Returns the stored value and its age without touching the origin.
pub async fn peek_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PeekResponse>> {
    let entry = state.cache.peek::<Value>(key.as_str()).await?;

    if !entry.is_present() {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(PeekResponse::new(key, entry)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.remove(key.as_str()).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.stats.snapshot()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheStatus};
    use serde_json::json;

    fn test_state() -> AppState {
        let config = CacheConfig::new(Arc::new(MemoryStorage::new()))
            .min_time_to_stale(60_000)
            .max_time_to_live(120_000);
        AppState::new(SwrCache::new(config).unwrap(), None)
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        // Set a value
        let req = SetRequest {
            key: "test_key".to_string(),
            value: json!({"price": 42}),
        };
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        // Get it back without an origin: fresh hit
        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.response.value, json!({"price": 42}));
        assert_eq!(response.response.status, CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn test_get_without_origin_fails_on_miss() {
        let state = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::Producer(_))));
    }

    #[tokio::test]
    async fn test_peek_handler() {
        let state = test_state();

        let result = peek_handler(State(state.clone()), Path("missing".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));

        state.cache.set("present", &json!("v")).await.unwrap();
        let response = peek_handler(State(state), Path("present".to_string()))
            .await
            .unwrap();
        assert_eq!(response.entry.cached_value, Some(json!("v")));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();

        state.cache.set("to_delete", &json!(1)).await.unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        // Verify it's gone
        let result = peek_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        state.cache.set("k", &json!(1)).await.unwrap();
        let _ = get_handler(State(state.clone()), Path("k".to_string())).await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.hits, 1);
        assert_eq!(response.stats.misses, 0);
        assert_eq!(response.stats.updates, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let req = SetRequest {
            key: "".to_string(), // Empty key is invalid
            value: json!("value"),
        };
        let result = set_handler(State(state), Json(req)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_config_with_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        };

        let state = AppState::from_config(&config).await.unwrap();
        state.cache.set("disk", &json!([1, 2])).await.unwrap();

        let entry = state.cache.peek::<Value>("disk").await.unwrap();
        assert_eq!(entry.cached_value, Some(json!([1, 2])));
    }
}
