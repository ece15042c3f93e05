// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration for geocache handles
//!
//! This module provides the configuration surface of the cache layer: the
//! default TTL, the key prefix that isolates logical caches sharing one
//! backend, per-namespace TTL overrides, and the choice of store and proximity
//! index backends.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use geocache::GeoCacheConfig;
//!
//! // In-process store and grid index, 1 hour TTL, "geo" prefix
//! let config = GeoCacheConfig::default();
//! assert_eq!(config.key_prefix, "geo");
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use geocache::{GeoCacheConfigBuilder, Ttl};
//!
//! let config = GeoCacheConfigBuilder::new()
//!     .default_ttl(Ttl::from_secs(600).unwrap())
//!     .namespace_ttl("demographics", Ttl::from_secs(86_400).unwrap())
//!     .max_entries(50_000)
//!     .build();
//!
//! assert_eq!(config.ttl_for("demographics").as_secs(), 86_400);
//! assert_eq!(config.ttl_for("nearby").as_secs(), 600);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::ConfigError;
use crate::types::cache::Ttl;

pub mod constants;

use constants::{env, DEFAULT_CELL_SIZE_DEGREES, DEFAULT_GEO_SET_KEY, DEFAULT_KEY_PREFIX};

/// Configuration for geocache handles
///
/// Use [`GeoCacheConfigBuilder`] for a fluent API to construct instances, or
/// [`GeoCacheConfig::from_env`] to read the deployment environment.
#[derive(Debug, Clone)]
pub struct GeoCacheConfig {
    /// TTL applied when a caller omits one
    /// Default: 3600 seconds
    pub default_ttl: Ttl,

    /// Leading key segment, isolating logical caches that share a backend
    /// Default: "geo"
    pub key_prefix: String,

    /// Namespace-specific overrides
    pub namespace_overrides: HashMap<String, NamespaceConfig>,

    /// Key/value backend of the expiring store
    pub store_backend: StoreBackendConfig,

    /// Backend of the proximity index
    pub proximity_backend: ProximityBackendConfig,

    /// Whether concurrent misses on one key share a single computation
    /// Default: true
    pub single_flight: bool,
}

/// Namespace-specific configuration overrides
#[derive(Debug, Clone, Default)]
pub struct NamespaceConfig {
    /// Override the TTL of results cached under this namespace
    pub ttl: Option<Ttl>,
}

/// Connection parameters for a Redis server
#[derive(Clone)]
pub struct RedisEndpoint {
    /// Server URL, e.g. `redis://localhost:6379/0`
    pub url: Url,
    /// Credentials applied on top of the URL
    pub credentials: Option<Credentials>,
}

/// Username and password for a backend
#[derive(Clone)]
pub struct Credentials {
    /// Username (ACL user), if any
    pub username: Option<String>,
    /// Password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut redacted = self.url.clone();
        if redacted.password().is_some() {
            let _ = redacted.set_password(Some("<redacted>"));
        }
        f.debug_struct("RedisEndpoint")
            .field("url", &redacted.as_str())
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl RedisEndpoint {
    /// Parses an endpoint URL without separate credentials
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the URL does not parse.
    pub fn parse(endpoint: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            url,
            credentials: None,
        })
    }

    /// Attaches credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The URL with credentials folded in, as handed to the Redis client
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the URL cannot carry credentials.
    pub fn connection_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.url.clone();
        if let Some(credentials) = &self.credentials {
            if let Some(username) = &credentials.username {
                url.set_username(username).map_err(|()| {
                    ConfigError::invalid_value("backendEndpoint", "URL cannot carry a username")
                })?;
            }
            url.set_password(Some(&credentials.password)).map_err(|()| {
                ConfigError::invalid_value("backendEndpoint", "URL cannot carry a password")
            })?;
        }
        Ok(url)
    }
}

/// Key/value backend of the expiring store
#[derive(Debug, Clone)]
pub enum StoreBackendConfig {
    /// In-process map
    Memory {
        /// Evict the soonest-to-expire entry beyond this many entries
        max_entries: Option<usize>,
        /// Interval of the background sweep of expired entries
        sweep_interval: Option<Duration>,
    },
    /// Single JSON file on disk
    Disk {
        /// Path to the cache file
        path: PathBuf,
    },
    /// Redis server (feature `redis`)
    Redis(RedisEndpoint),
    /// Caching disabled: every lookup misses
    Disabled,
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        StoreBackendConfig::Memory {
            max_entries: None,
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// Backend of the proximity index
#[derive(Debug, Clone)]
pub enum ProximityBackendConfig {
    /// In-process grid index
    InProcess {
        /// Edge length of a grid cell, in degrees
        cell_size_degrees: f64,
        /// Reject out-of-range coordinates on insert
        strict_coordinates: bool,
    },
    /// Redis GEO sorted set (feature `redis`)
    Redis {
        /// Server to connect to
        endpoint: RedisEndpoint,
        /// Sorted set holding the points
        key: String,
    },
}

impl Default for ProximityBackendConfig {
    fn default() -> Self {
        ProximityBackendConfig::InProcess {
            cell_size_degrees: DEFAULT_CELL_SIZE_DEGREES,
            strict_coordinates: false,
        }
    }
}

impl Default for GeoCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Ttl::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            namespace_overrides: HashMap::new(),
            store_backend: StoreBackendConfig::default(),
            proximity_backend: ProximityBackendConfig::default(),
            single_flight: true,
        }
    }
}

impl GeoCacheConfig {
    /// Load configuration from the process environment (and `.env`, if present)
    ///
    /// Recognized variables, compatible with the lookup service's deployment:
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `REDIS_HOST` | Selects the Redis store and proximity backends |
    /// | `REDIS_PORT` | Redis port (default 6379) |
    /// | `REDIS_PASSWORD` | Redis password |
    /// | `REDIS_DB` | Redis database (default 0) |
    /// | `CACHE_TTL` | Default TTL in seconds |
    /// | `GEOCACHE_KEY_PREFIX` | Key prefix |
    /// | `GEOCACHE_DISK_PATH` | Selects the disk store backend when Redis is not configured |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable has an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| dotenvy::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = GeoCacheConfigBuilder::new();

        if let Some(raw) = lookup(env::CACHE_TTL) {
            let seconds: u64 = raw.trim().parse().map_err(|e| {
                let reason = format!("'{raw}' is not an integer: {e}");
                ConfigError::invalid_value(env::CACHE_TTL, reason)
            })?;
            let ttl = Ttl::from_secs(seconds)
                .map_err(|e| ConfigError::invalid_value(env::CACHE_TTL, e.to_string()))?;
            builder = builder.default_ttl(ttl);
        }

        if let Some(prefix) = lookup(env::KEY_PREFIX) {
            builder = builder.key_prefix(prefix);
        }

        if let Some(host) = lookup(env::REDIS_HOST) {
            let port = match lookup(env::REDIS_PORT) {
                Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                    ConfigError::invalid_value(env::REDIS_PORT, format!("'{raw}': {e}"))
                })?,
                None => 6379,
            };
            let db = match lookup(env::REDIS_DB) {
                Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                    ConfigError::invalid_value(env::REDIS_DB, format!("'{raw}': {e}"))
                })?,
                None => 0,
            };

            let mut endpoint = RedisEndpoint::parse(&format!("redis://{host}:{port}/{db}"))?;
            if let Some(password) = lookup(env::REDIS_PASSWORD).filter(|p| !p.is_empty()) {
                endpoint = endpoint.with_credentials(Credentials {
                    username: None,
                    password,
                });
            }

            builder = builder
                .store_backend(StoreBackendConfig::Redis(endpoint.clone()))
                .proximity_backend(ProximityBackendConfig::Redis {
                    endpoint,
                    key: DEFAULT_GEO_SET_KEY.to_string(),
                });
        } else if let Some(path) = lookup(env::DISK_PATH) {
            builder = builder.store_backend(StoreBackendConfig::Disk { path: path.into() });
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Checks values that the type system does not
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an empty key prefix, a
    /// namespace override whose name cannot be a key segment, or a grid cell
    /// size outside `(0, 180]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::invalid_value("keyPrefix", "must not be empty"));
        }

        for namespace in self.namespace_overrides.keys() {
            if namespace.is_empty() || namespace.contains(':') {
                return Err(ConfigError::invalid_value(
                    "namespace_overrides",
                    format!("'{namespace}' is not a valid namespace"),
                ));
            }
        }

        if let ProximityBackendConfig::InProcess {
            cell_size_degrees, ..
        } = self.proximity_backend
        {
            if !(cell_size_degrees.is_finite()
                && cell_size_degrees > 0.0
                && cell_size_degrees <= 180.0)
            {
                return Err(ConfigError::invalid_value(
                    "cell_size_degrees",
                    format!("{cell_size_degrees} is outside (0, 180]"),
                ));
            }
        }

        Ok(())
    }

    /// Get effective TTL for a namespace
    ///
    /// Returns the namespace override if set, otherwise the default TTL.
    pub fn ttl_for(&self, namespace: &str) -> Ttl {
        self.namespace_overrides
            .get(namespace)
            .and_then(|c| c.ttl)
            .unwrap_or(self.default_ttl)
    }

    /// Set namespace-specific override
    pub fn set_namespace_override(
        &mut self,
        namespace: impl Into<String>,
        config: NamespaceConfig,
    ) {
        self.namespace_overrides.insert(namespace.into(), config);
    }
}

/// Builder for [`GeoCacheConfig`]
///
/// # Example
///
/// ```rust
/// use geocache::{GeoCacheConfigBuilder, Ttl};
///
/// let config = GeoCacheConfigBuilder::new()
///     .key_prefix("census")
///     .namespace_ttl("nearby", Ttl::from_secs(300).unwrap())
///     .single_flight(false)
///     .build();
/// assert!(!config.single_flight);
/// ```
#[derive(Debug, Default)]
pub struct GeoCacheConfigBuilder {
    config: GeoCacheConfig,
}

impl GeoCacheConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL
    pub fn default_ttl(mut self, ttl: Ttl) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Set the key prefix
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Convenience: set the TTL of one namespace
    pub fn namespace_ttl(mut self, namespace: impl Into<String>, ttl: Ttl) -> Self {
        let namespace = namespace.into();
        let mut existing = self
            .config
            .namespace_overrides
            .remove(&namespace)
            .unwrap_or_default();
        existing.ttl = Some(ttl);
        self.config.set_namespace_override(namespace, existing);
        self
    }

    /// Set the store backend
    pub fn store_backend(mut self, backend: StoreBackendConfig) -> Self {
        self.config.store_backend = backend;
        self
    }

    /// Convenience: in-process store bounded to `max_entries`
    ///
    /// Keeps the configured sweep interval if the memory backend was already selected.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        let sweep_interval = match &self.config.store_backend {
            StoreBackendConfig::Memory { sweep_interval, .. } => *sweep_interval,
            _ => Some(Duration::from_secs(60)),
        };
        self.config.store_backend = StoreBackendConfig::Memory {
            max_entries: Some(max_entries),
            sweep_interval,
        };
        self
    }

    /// Convenience: disable caching entirely
    pub fn disabled(mut self) -> Self {
        self.config.store_backend = StoreBackendConfig::Disabled;
        self
    }

    /// Set the proximity index backend
    pub fn proximity_backend(mut self, backend: ProximityBackendConfig) -> Self {
        self.config.proximity_backend = backend;
        self
    }

    /// Enable or disable single-flight resolution
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.config.single_flight = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GeoCacheConfig {
        self.config
    }
}
