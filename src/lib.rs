// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! # geocache
//!
//! Query-result caching and proximity indexing for geospatial and demographic
//! lookup services.
//!
//! The crate sits in front of a slow spatial database. It has four parts:
//!
//! - [`KeyDeriver`]: Turns a query namespace and its parameters into a stable,
//!   order-insensitive cache key
//! - [`ExpiringStore`]: Key/value store with per-entry TTL over a pluggable
//!   [`CacheBackend`] (memory, disk, Redis or disabled)
//! - [`ProximityIndex`]: Radius lookups over known points without touching the
//!   database ([`GridIndex`] in process, `RedisGeoIndex` with the `redis`
//!   feature)
//! - [`QueryCacheCoordinator`]: Cache-aside resolution, with concurrent misses
//!   on one key collapsed into a single computation
//!
//! [`GeoCache`] builds all of them from a [`GeoCacheConfig`].
//!
//! ## Degradation
//!
//! An unreachable backend never fails a lookup. Store reads become misses,
//! writes report `false`, invalidations report `0` and proximity queries return
//! no results, each logged through `tracing`. Only caller mistakes (invalid
//! parameters, a zero TTL, a negative radius) are returned as errors.
//!
//! ## Quick Start
//!
//! ```rust
//! use geocache::{GeoCache, GeoCacheConfig, ParameterSet};
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let cache = GeoCache::connect(GeoCacheConfig::default()).await.unwrap();
//!
//! let params = ParameterSet::new()
//!     .with("latitude", 38.627).unwrap()
//!     .with("longitude", -90.199).unwrap()
//!     .with("radius_km", 10).unwrap();
//!
//! let nearby: Vec<String> = cache
//!     .coordinator()
//!     .resolve("nearby", &params, || async {
//!         // Query the spatial database here
//!         Ok::<_, std::io::Error>(vec!["29510".to_string()])
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(nearby, vec!["29510"]);
//! # });
//! ```
//!
//! ## Features
//!
//! - `redis`: Redis key/value and GEO backends

pub mod bootstrap;
pub mod config;
mod coordinator;
pub mod errors;
mod key;
mod proximity;
mod store;
mod tracing;
pub mod types;

pub use bootstrap::{GeoCache, HealthReport, HealthStatus};
pub use config::constants;
pub use config::{
    Credentials, GeoCacheConfig, GeoCacheConfigBuilder, NamespaceConfig, ProximityBackendConfig,
    RedisEndpoint, StoreBackendConfig,
};
pub use coordinator::QueryCacheCoordinator;
pub use errors::{
    ConfigError, GeoCacheError, KeyError, ProximityError, ResolveError, StoreError,
};
pub use key::{digest_hex, KeyDeriver, ParameterSet};
#[cfg(feature = "redis")]
pub use proximity::RedisGeoIndex;
pub use proximity::{GridIndex, ProximityIndex};
#[cfg(feature = "redis")]
pub use store::RedisBackend;
pub use store::{CacheBackend, CacheStats, DiskBackend, ExpiringStore, MemoryBackend, NoOpBackend};
pub use types::cache::{TimestampMillis, Ttl, WriteSequence};
pub use types::geo::{
    haversine_meters, DistanceUnit, GeoPoint, ProximityResult, RadiusQuery, UnknownUnit,
    EARTH_RADIUS_METERS,
};
