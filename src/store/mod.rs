// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Expiring key/value store with prefix invalidation
//!
//! [`ExpiringStore`] is the handle callers use. It wraps a [`CacheBackend`]
//! and is responsible for the store-wide default TTL, the value envelope and
//! the degradation rules: backend failures are logged and reported as a miss,
//! `false` or `0`, never as an error.
//!
//! Backends:
//!
//! - [`MemoryBackend`]: In-process map with lazy expiry and an optional sweeper
//! - [`DiskBackend`]: Single versioned JSON file with file locking
//! - [`NoOpBackend`]: Disables caching entirely
//! - `RedisBackend` (feature `redis`): Redis `SET EX` / `GET` / `DEL` / `SCAN`
//!
//! # Examples
//!
//! ```rust
//! use geocache::{ExpiringStore, MemoryBackend, Ttl};
//!
//! # tokio_test_block_on(async {
//! let store = ExpiringStore::new(MemoryBackend::new(), Ttl::default());
//!
//! assert!(store.set("geo:nearby:a", &vec!["29510"], Some(60)).await.unwrap());
//! let ids: Option<Vec<String>> = store.get("geo:nearby:a").await;
//! assert_eq!(ids, Some(vec!["29510".to_string()]));
//!
//! assert!(store.set("geo:nearby:b", &1, Some(0)).await.is_err());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use crate::errors::StoreError;
use crate::tracing::spans;
use crate::types::cache::Ttl;

mod disk;
pub(crate) mod envelope;
mod memory;
mod noop;
#[cfg(feature = "redis")]
mod redis;

pub use disk::DiskBackend;
pub use memory::MemoryBackend;
pub use noop::NoOpBackend;
#[cfg(feature = "redis")]
pub(crate) use redis::LazyConnection;
#[cfg(feature = "redis")]
pub use redis::RedisBackend;

use envelope::Decoded;

/// Trait for key/value cache backends
///
/// Payloads are opaque strings produced by the store. Every method reports
/// backend trouble as `Err`; the store decides how that surfaces to callers.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access. Use
/// interior mutability (e.g. `DashMap`, `Mutex`) as needed.
///
/// # Expiry
///
/// A backend must never return a payload whose TTL has elapsed, whether it
/// evicts lazily on read or actively.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the live payload stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `payload` under `key` for `ttl`, replacing any prior entry
    async fn set(&self, key: &str, payload: String, ttl: Ttl) -> Result<(), StoreError>;

    /// Removes `key`; returns whether a live entry existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every live entry whose key starts with `prefix`; returns how many
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Physically removes expired entries; returns how many
    ///
    /// Backends that expire natively return `Ok(0)`.
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Checks that the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Number of live entries
    async fn len(&self) -> Result<usize, StoreError>;

    /// Returns a human-readable name for this backend
    ///
    /// Used for logging and debugging.
    fn name(&self) -> &'static str;
}

/// Statistics about store usage since the handle was created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that returned nothing, for any reason
    pub misses: u64,
    /// Reads that found a payload that could not be decoded
    pub decode_failures: u64,
    /// Successful writes
    pub writes: u64,
    /// Writes rejected by the backend
    pub failed_writes: u64,
    /// Backend failures of any operation
    pub backend_errors: u64,
    /// Entries removed by `delete` and `invalidate_prefix`
    pub invalidated: u64,
    /// Expired entries removed by `purge_expired`
    pub expirations: u64,
    /// Live entries at the time of the snapshot (0 if unknown)
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, writes={}, failed_writes={}, backend_errors={}, invalidated={}, expirations={}, entries={}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.writes,
            self.failed_writes,
            self.backend_errors,
            self.invalidated,
            self.expirations,
            self.entries,
            self.hit_rate()
        )
    }
}

#[derive(Debug, Default)]
struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    writes: AtomicU64,
    failed_writes: AtomicU64,
    backend_errors: AtomicU64,
    invalidated: AtomicU64,
    expirations: AtomicU64,
}

impl StatsRecorder {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Shared handle to an expiring key/value store
///
/// Cloning is cheap; clones share the backend and statistics.
#[derive(Clone)]
pub struct ExpiringStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Ttl,
    stats: Arc<StatsRecorder>,
}

impl fmt::Debug for ExpiringStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("backend", &self.backend.name())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl ExpiringStore {
    /// Creates a store over `backend`
    pub fn new<B: CacheBackend + 'static>(backend: B, default_ttl: Ttl) -> Self {
        Self::from_arc(Arc::new(backend), default_ttl)
    }

    /// Creates a store over a shared backend
    pub fn from_arc(backend: Arc<dyn CacheBackend>, default_ttl: Ttl) -> Self {
        Self {
            backend,
            default_ttl,
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// TTL applied when `set` is called without one
    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Stores `value` under `key`
    ///
    /// `ttl_seconds` of `None` applies the default TTL. Returns `Ok(false)` if
    /// the backend could not take the write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTtl`] for `Some(0)` and
    /// [`StoreError::Serialization`] if `value` cannot be serialized.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<bool, StoreError> {
        let ttl = match ttl_seconds {
            Some(seconds) => Ttl::from_secs(seconds)?,
            None => self.default_ttl,
        };
        self.set_with_ttl(key, value, ttl).await
    }

    /// Stores `value` under `key` with an already validated TTL
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if `value` cannot be serialized.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Ttl,
    ) -> Result<bool, StoreError> {
        let payload = envelope::encode(value)?;

        match self.backend.set(key, payload, ttl).await {
            Ok(()) => {
                StatsRecorder::bump(&self.stats.writes, 1);
                debug!(key, ttl = %ttl, backend = self.backend.name(), "Cache write");
                Ok(true)
            }
            Err(e) => {
                StatsRecorder::bump(&self.stats.failed_writes, 1);
                self.backend_failure("set", &e);
                Ok(false)
            }
        }
    }

    /// Returns the live value under `key`, decoded as `T`
    ///
    /// Absent on a miss, on expiry, when the backend fails, and when the stored
    /// payload was written by another envelope version or does not decode
    /// into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = match self.backend.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                StatsRecorder::bump(&self.stats.misses, 1);
                debug!(key, backend = self.backend.name(), "Cache miss");
                return None;
            }
            Err(e) => {
                StatsRecorder::bump(&self.stats.misses, 1);
                self.backend_failure("get", &e);
                return None;
            }
        };

        match envelope::decode(&payload) {
            Decoded::Value(value) => {
                StatsRecorder::bump(&self.stats.hits, 1);
                debug!(key, backend = self.backend.name(), "Cache hit");
                Some(value)
            }
            Decoded::VersionMismatch(version) => {
                StatsRecorder::bump(&self.stats.misses, 1);
                StatsRecorder::bump(&self.stats.decode_failures, 1);
                warn!(
                    key,
                    cached_version = version,
                    current_version = envelope::ENVELOPE_VERSION,
                    "Cache envelope version mismatch, treating as miss"
                );
                None
            }
            Decoded::Malformed(e) => {
                StatsRecorder::bump(&self.stats.misses, 1);
                StatsRecorder::bump(&self.stats.decode_failures, 1);
                warn!(key, error = %e, "Failed to decode cached value, treating as miss");
                None
            }
        }
    }

    /// Untyped variant of [`get`](Self::get)
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.get::<Value>(key).await
    }

    /// Removes `key`; returns whether a live entry existed
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(existed) => {
                if existed {
                    StatsRecorder::bump(&self.stats.invalidated, 1);
                }
                debug!(key, existed, "Cache delete");
                existed
            }
            Err(e) => {
                self.backend_failure("delete", &e);
                false
            }
        }
    }

    /// Removes every entry whose key starts with `prefix`; returns how many
    ///
    /// A prefix matching nothing returns 0. Runs in time proportional to the
    /// number of stored keys, so keep prefixes narrow.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let span = spans::invalidate_prefix(prefix, self.backend.name());
        async {
            match self.backend.invalidate_prefix(prefix).await {
                Ok(removed) => {
                    StatsRecorder::bump(&self.stats.invalidated, removed as u64);
                    info!(prefix, removed, "Invalidated cache entries by prefix");
                    removed
                }
                Err(e) => {
                    self.backend_failure("invalidate_prefix", &e);
                    0
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Reports whether the backend is reachable
    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                self.backend_failure("ping", &e);
                false
            }
        }
    }

    /// Physically removes expired entries; returns how many
    pub async fn purge_expired(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(removed) => {
                StatsRecorder::bump(&self.stats.expirations, removed as u64);
                if removed > 0 {
                    debug!(removed, backend = self.backend.name(), "Purged expired cache entries");
                }
                removed
            }
            Err(e) => {
                self.backend_failure("purge_expired", &e);
                0
            }
        }
    }

    /// Returns current statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = match self.backend.len().await {
            Ok(len) => len,
            Err(e) => {
                self.backend_failure("len", &e);
                0
            }
        };
        self.stats.snapshot(entries)
    }

    fn backend_failure(&self, operation: &'static str, err: &StoreError) {
        StatsRecorder::bump(&self.stats.backend_errors, 1);
        error!(
            operation,
            backend = self.backend.name(),
            error = %err,
            "Cache backend failure, degrading to miss"
        );
    }
}
