// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Construction of shared cache handles from configuration
//!
//! [`GeoCache::connect`] builds the store, the proximity index and the
//! coordinator once at startup. Consumers receive clones of the handle; every
//! clone shares the same backends.
//!
//! # Examples
//!
//! ```rust
//! use geocache::{GeoCache, GeoCacheConfig, HealthStatus};
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let cache = GeoCache::connect(GeoCacheConfig::default()).await.unwrap();
//! let report = cache.health().await;
//! assert_eq!(report.status, HealthStatus::Healthy);
//! # });
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::config::{GeoCacheConfig, ProximityBackendConfig, StoreBackendConfig};
use crate::coordinator::QueryCacheCoordinator;
use crate::errors::ConfigError;
use crate::proximity::{GridIndex, ProximityIndex};
use crate::store::{CacheBackend, DiskBackend, ExpiringStore, MemoryBackend, NoOpBackend};
use crate::tracing::spans;

/// Shared handles to the cache layer
///
/// Cloning is cheap; clones share the store, the index and the in-flight
/// registry of the coordinator.
#[derive(Clone)]
pub struct GeoCache {
    config: Arc<GeoCacheConfig>,
    store: ExpiringStore,
    index: Arc<dyn ProximityIndex>,
    coordinator: QueryCacheCoordinator,
}

impl fmt::Debug for GeoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoCache")
            .field("store", &self.store.backend_name())
            .field("index", &self.index.name())
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

/// Overall health of the cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store and index are reachable
    Healthy,
    /// At least one backend is unreachable; lookups still work as misses
    Unhealthy,
}

/// Result of [`GeoCache::health`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall status
    pub status: HealthStatus,
    /// Whether the key/value store answered
    pub cache: bool,
    /// Whether the proximity index answered
    pub proximity_index: bool,
    /// When the probe ran
    pub checked_at: DateTime<Utc>,
}

impl GeoCache {
    /// Validates `config` and opens its backends
    ///
    /// A memory store with a sweep interval starts its background sweeper, so
    /// this must be called from within a Tokio runtime.
    ///
    /// An unreachable Redis server does not fail startup: it is logged, the
    /// handle degrades to misses and empty proximity results, and the
    /// connection is retried on later operations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid, a disk path is
    /// unusable, a Redis URL is rejected, or a Redis backend is selected
    /// without the `redis` feature.
    pub async fn connect(config: GeoCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let backend = open_store(&config.store_backend).await?;
        let store = ExpiringStore::from_arc(backend, config.default_ttl);
        let index = open_index(&config.proximity_backend).await?;
        let coordinator = QueryCacheCoordinator::from_config(store.clone(), &config);

        info!(
            store = store.backend_name(),
            index = index.name(),
            default_ttl = %config.default_ttl,
            key_prefix = %config.key_prefix,
            single_flight = config.single_flight,
            "Geo cache ready"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            index,
            coordinator,
        })
    }

    /// Assembles a handle from already constructed parts
    pub fn from_parts(
        config: GeoCacheConfig,
        store: ExpiringStore,
        index: Arc<dyn ProximityIndex>,
    ) -> Self {
        let coordinator = QueryCacheCoordinator::from_config(store.clone(), &config);
        Self {
            config: Arc::new(config),
            store,
            index,
            coordinator,
        }
    }

    /// Configuration the handle was built from
    pub fn config(&self) -> &GeoCacheConfig {
        &self.config
    }

    /// The expiring key/value store
    pub fn store(&self) -> &ExpiringStore {
        &self.store
    }

    /// The proximity index
    pub fn index(&self) -> &Arc<dyn ProximityIndex> {
        &self.index
    }

    /// The query cache coordinator
    pub fn coordinator(&self) -> &QueryCacheCoordinator {
        &self.coordinator
    }

    /// Probes the store and the index concurrently
    pub async fn health(&self) -> HealthReport {
        let span = spans::health(self.store.backend_name(), self.index.name());
        async {
            let (cache, proximity_index) =
                futures::join!(self.store.health_check(), self.index.health_check());

            let status = if cache && proximity_index {
                HealthStatus::Healthy
            } else {
                warn!(cache, proximity_index, "Geo cache unhealthy");
                HealthStatus::Unhealthy
            };

            HealthReport {
                status,
                cache,
                proximity_index,
                checked_at: Utc::now(),
            }
        }
        .instrument(span)
        .await
    }
}

async fn open_store(config: &StoreBackendConfig) -> Result<Arc<dyn CacheBackend>, ConfigError> {
    let backend: Arc<dyn CacheBackend> = match config {
        StoreBackendConfig::Memory {
            max_entries,
            sweep_interval,
        } => {
            let mut backend = MemoryBackend::new();
            if let Some(max_entries) = max_entries {
                backend = backend.with_max_entries(*max_entries);
            }
            let backend = Arc::new(backend);
            if let Some(interval) = sweep_interval {
                // Exits on its own once the backend is dropped
                backend.spawn_sweeper(*interval);
            }
            backend
        }
        StoreBackendConfig::Disk { path } => Arc::new(DiskBackend::new(path.clone()).validate()?),
        StoreBackendConfig::Redis(endpoint) => open_redis_store(endpoint).await?,
        StoreBackendConfig::Disabled => Arc::new(NoOpBackend),
    };
    Ok(backend)
}

async fn open_index(
    config: &ProximityBackendConfig,
) -> Result<Arc<dyn ProximityIndex>, ConfigError> {
    match config {
        ProximityBackendConfig::InProcess {
            cell_size_degrees,
            strict_coordinates,
        } => {
            let index = GridIndex::with_cell_size(*cell_size_degrees);
            let index = if *strict_coordinates {
                index.strict()
            } else {
                index
            };
            Ok(Arc::new(index))
        }
        ProximityBackendConfig::Redis { endpoint, key } => open_redis_index(endpoint, key).await,
    }
}

#[cfg(feature = "redis")]
async fn open_redis_store(
    endpoint: &crate::config::RedisEndpoint,
) -> Result<Arc<dyn CacheBackend>, ConfigError> {
    let url = endpoint.connection_url()?;
    let backend = crate::store::RedisBackend::connect(&url).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "redis"))]
async fn open_redis_store(
    _endpoint: &crate::config::RedisEndpoint,
) -> Result<Arc<dyn CacheBackend>, ConfigError> {
    Err(ConfigError::FeatureDisabled {
        backend: "RedisBackend",
        feature: "redis",
    })
}

#[cfg(feature = "redis")]
async fn open_redis_index(
    endpoint: &crate::config::RedisEndpoint,
    key: &str,
) -> Result<Arc<dyn ProximityIndex>, ConfigError> {
    let url = endpoint.connection_url()?;
    let index = crate::proximity::RedisGeoIndex::connect(&url, key).await?;
    Ok(Arc::new(index))
}

#[cfg(not(feature = "redis"))]
async fn open_redis_index(
    _endpoint: &crate::config::RedisEndpoint,
    _key: &str,
) -> Result<Arc<dyn ProximityIndex>, ConfigError> {
    Err(ConfigError::FeatureDisabled {
        backend: "RedisGeoIndex",
        feature: "redis",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoCacheConfigBuilder;
    use crate::types::geo::GeoPoint;

    #[tokio::test]
    async fn test_connect_default() {
        let cache = GeoCache::connect(GeoCacheConfig::default()).await.unwrap();
        assert_eq!(cache.store().backend_name(), "MemoryBackend");
        assert_eq!(cache.index().name(), "GridIndex");

        let report = cache.health().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.cache && report.proximity_index);
    }

    #[tokio::test]
    async fn test_clones_share_backends() {
        let cache = GeoCache::connect(GeoCacheConfig::default()).await.unwrap();
        let clone = cache.clone();

        cache.store().set("geo:test:1", &1u32, None).await.unwrap();
        clone
            .index()
            .insert(GeoPoint::new("stl", -90.2, 38.6))
            .await
            .unwrap();

        assert_eq!(clone.store().get::<u32>("geo:test:1").await, Some(1));
        assert_eq!(cache.index().len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = GeoCacheConfigBuilder::new().key_prefix("").build();
        assert!(matches!(
            GeoCache::connect(config).await,
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_store() {
        let config = GeoCacheConfigBuilder::new().disabled().build();
        let cache = GeoCache::connect(config).await.unwrap();
        assert_eq!(cache.store().backend_name(), "NoOpBackend");
        assert_eq!(cache.health().await.status, HealthStatus::Healthy);
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_redis_requires_feature() {
        let endpoint = crate::config::RedisEndpoint::parse("redis://localhost:6379/0").unwrap();
        let config = GeoCacheConfigBuilder::new()
            .store_backend(StoreBackendConfig::Redis(endpoint))
            .build();
        assert!(matches!(
            GeoCache::connect(config).await,
            Err(ConfigError::FeatureDisabled { feature: "redis", .. })
        ));
    }

    #[test]
    fn test_health_report_serializes_lowercase() {
        let report = HealthReport {
            status: HealthStatus::Unhealthy,
            cache: false,
            proximity_index: true,
            checked_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["cache"], false);
    }
}
