//! Mini SWR - A stale-while-revalidate cache over pluggable storage
//!
//! Serves cached values immediately, refreshes stale ones in the background,
//! deduplicates concurrent revalidations per key and reports every step on
//! an event stream.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use api::AppState;
pub use cache::{CacheConfig, CacheKey, CacheResponse, CacheStatus, SwrCache};
pub use config::ServerConfig;
pub use error::{CacheError, Result, StorageError};
pub use storage::{FileStorage, MemoryStorage, Storage};
