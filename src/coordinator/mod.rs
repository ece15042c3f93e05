// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Cache-aside resolution of namespaced queries
//!
//! [`QueryCacheCoordinator::resolve`] derives a key from a namespace and a
//! parameter set, returns the cached result on a hit, and otherwise runs the
//! caller's `compute` future, caches a successful result with the namespace's
//! TTL and returns it. Failed computations are never cached.
//!
//! With single-flight enabled (the default), concurrent misses on one key run
//! `compute` once: the first caller leads, the others wait and then read the
//! cached result. If the leader fails or is cancelled, the waiters race for
//! leadership again.
//!
//! # Examples
//!
//! ```rust
//! use geocache::{ExpiringStore, MemoryBackend, ParameterSet, QueryCacheCoordinator, Ttl};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = ExpiringStore::new(MemoryBackend::new(), Ttl::default());
//! let coordinator = QueryCacheCoordinator::new(store);
//! let params = ParameterSet::new().with("type", "county").unwrap();
//!
//! let counties: Vec<String> = coordinator
//!     .resolve("locations", &params, || async {
//!         Ok::<_, std::io::Error>(vec!["St. Louis County".to_string()])
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(counties.len(), 1);
//! # });
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn, Instrument, Span};

use crate::config::GeoCacheConfig;
use crate::errors::{GeoCacheError, KeyError, ResolveError};
use crate::key::KeyDeriver;
use crate::store::ExpiringStore;
use crate::tracing::spans;
use crate::types::cache::Ttl;

mod records;
mod single_flight;

use single_flight::{Flight, InFlight};

/// Times a waiting caller follows another leader before computing on its own
const MAX_FOLLOW_ROUNDS: usize = 3;

/// Cache-aside coordinator over an [`ExpiringStore`]
///
/// Cloning is cheap; clones share the store and the in-flight registry.
#[derive(Clone)]
pub struct QueryCacheCoordinator {
    store: ExpiringStore,
    keys: KeyDeriver,
    default_ttl: Ttl,
    namespace_ttls: Arc<HashMap<String, Ttl>>,
    in_flight: Option<Arc<InFlight>>,
}

impl fmt::Debug for QueryCacheCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCacheCoordinator")
            .field("store", &self.store)
            .field("key_prefix", &self.keys.prefix())
            .field("default_ttl", &self.default_ttl)
            .field("single_flight", &self.in_flight.is_some())
            .finish()
    }
}

impl QueryCacheCoordinator {
    /// Creates a coordinator with the `geo` key prefix, the store's default
    /// TTL for every namespace and single-flight enabled
    pub fn new(store: ExpiringStore) -> Self {
        let default_ttl = store.default_ttl();
        Self {
            store,
            keys: KeyDeriver::default(),
            default_ttl,
            namespace_ttls: Arc::new(HashMap::new()),
            in_flight: Some(Arc::new(InFlight::default())),
        }
    }

    /// Creates a coordinator using the prefix, TTLs and single-flight setting
    /// of `config`
    pub fn from_config(store: ExpiringStore, config: &GeoCacheConfig) -> Self {
        let namespace_ttls = config
            .namespace_overrides
            .iter()
            .filter_map(|(namespace, overrides)| Some((namespace.clone(), overrides.ttl?)))
            .collect();

        Self {
            store,
            keys: KeyDeriver::new(config.key_prefix.clone()),
            default_ttl: config.default_ttl,
            namespace_ttls: Arc::new(namespace_ttls),
            in_flight: config.single_flight.then(|| Arc::new(InFlight::default())),
        }
    }

    /// Enables or disables single-flight resolution
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(|| Arc::new(InFlight::default()));
        self
    }

    /// The underlying store
    pub fn store(&self) -> &ExpiringStore {
        &self.store
    }

    /// The key deriver in use
    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    /// TTL applied to results cached under `namespace`
    pub fn ttl_for(&self, namespace: &str) -> Ttl {
        self.namespace_ttls
            .get(namespace)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Returns the cached result for `(namespace, params)`, computing and
    /// caching it on a miss
    ///
    /// `compute` runs at most once per call and not at all on a hit. Its error
    /// is returned unchanged and nothing is cached. Backend failures only make
    /// every call a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Key`] if no key can be derived from `params`
    /// (compute is not run) and [`ResolveError::Compute`] if compute fails.
    pub async fn resolve<T, P, E, F, Fut>(
        &self,
        namespace: &str,
        params: &P,
        compute: F,
    ) -> Result<T, ResolveError<E>>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.keys.derive_key_for(namespace, params)?;
        let span = spans::resolve(namespace, &key);
        self.resolve_key(namespace, &key, compute)
            .instrument(span)
            .await
    }

    async fn resolve_key<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        compute: F,
    ) -> Result<T, ResolveError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(in_flight) = &self.in_flight else {
            if let Some(hit) = self.store.get::<T>(key).await {
                Span::current().record("outcome", "hit");
                return Ok(hit);
            }
            Span::current().record("outcome", "miss");
            return self.compute_and_store(namespace, key, compute).await;
        };

        let mut rounds = 0;
        loop {
            if let Some(hit) = self.store.get::<T>(key).await {
                Span::current().record("outcome", if rounds == 0 { "hit" } else { "shared" });
                return Ok(hit);
            }

            match in_flight.join(key) {
                Flight::Leader(guard) => {
                    Span::current().record("outcome", "miss");
                    let result = self.compute_and_store(namespace, key, compute).await;
                    drop(guard);
                    return result;
                }
                Flight::Follower(done) if rounds < MAX_FOLLOW_ROUNDS => {
                    debug!(key, "Waiting for in-flight computation");
                    rounds += 1;
                    single_flight::wait(done).await;
                }
                Flight::Follower(_) => {
                    Span::current().record("outcome", "miss");
                    return self.compute_and_store(namespace, key, compute).await;
                }
            }
        }
    }

    async fn compute_and_store<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        compute: F,
    ) -> Result<T, ResolveError<E>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = compute().await.map_err(|e| {
            debug!(key, "Compute failed, nothing cached");
            ResolveError::Compute(e)
        })?;

        if let Err(e) = self
            .store
            .set_with_ttl(key, &value, self.ttl_for(namespace))
            .await
        {
            warn!(key, error = %e, "Computed result could not be cached");
        }

        Ok(value)
    }

    /// Returns the cached result for `(namespace, params)` without computing
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if no key can be derived from `params`.
    pub async fn cached<T, P>(&self, namespace: &str, params: &P) -> Result<Option<T>, KeyError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let key = self.keys.derive_key_for(namespace, params)?;
        Ok(self.store.get(&key).await)
    }

    /// Caches `value` as the result for `(namespace, params)`
    ///
    /// `ttl_seconds` of `None` applies the namespace TTL. Returns `Ok(false)`
    /// if the backend could not take the write.
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for underivable parameters and
    /// [`GeoCacheError::Store`] for a zero TTL or an unserializable value.
    pub async fn cache_result<T, P>(
        &self,
        namespace: &str,
        params: &P,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<bool, GeoCacheError>
    where
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let key = self.keys.derive_key_for(namespace, params)?;
        let ttl = match ttl_seconds {
            Some(seconds) => Ttl::from_secs(seconds)?,
            None => self.ttl_for(namespace),
        };
        Ok(self.store.set_with_ttl(&key, value, ttl).await?)
    }

    /// Drops the cached result for `(namespace, params)`; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if no key can be derived from `params`.
    pub async fn invalidate<P>(&self, namespace: &str, params: &P) -> Result<bool, KeyError>
    where
        P: Serialize + ?Sized,
    {
        let key = self.keys.derive_key_for(namespace, params)?;
        Ok(self.store.delete(&key).await)
    }

    /// Drops every cached result of `namespace`; returns how many
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidNamespace`] for an invalid namespace.
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<usize, KeyError> {
        let prefix = self.keys.namespace_prefix(namespace)?;
        Ok(self.store.invalidate_prefix(&prefix).await)
    }

    /// Number of keys with a computation in flight
    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.as_ref().map_or(0, |flights| flights.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoCacheConfigBuilder;
    use crate::store::{MemoryBackend, NoOpBackend};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("database unavailable")]
    struct DbError;

    fn coordinator() -> QueryCacheCoordinator {
        QueryCacheCoordinator::new(ExpiringStore::new(MemoryBackend::new(), Ttl::default()))
    }

    #[tokio::test]
    async fn test_second_resolve_hits() {
        let coordinator = coordinator();
        let calls = AtomicUsize::new(0);
        let params = json!({"type": "county"});

        for _ in 0..2 {
            let value: Vec<String> = coordinator
                .resolve("locations", &params, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DbError>(vec!["29189".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["29189"]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compute_error_not_cached() {
        let coordinator = coordinator();
        let params = json!({"type": "state"});

        let err = coordinator
            .resolve("locations", &params, || async { Err::<Vec<String>, _>(DbError) })
            .await
            .unwrap_err();
        assert!(err.is_compute());

        let cached: Option<Vec<String>> = coordinator.cached("locations", &params).await.unwrap();
        assert!(cached.is_none());
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_key_error_skips_compute() {
        let coordinator = coordinator();
        let calls = AtomicUsize::new(0);
        let err = coordinator
            .resolve("bad:namespace", &json!({}), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, DbError>(0)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Key(KeyError::InvalidNamespace { .. })));

        let err = coordinator
            .resolve("locations", &json!([1, 2]), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, DbError>(0)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Key(KeyError::InvalidParameter { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_namespace_ttl_applies() {
        let config = GeoCacheConfigBuilder::new()
            .namespace_ttl("nearby", Ttl::from_secs(1).unwrap())
            .build();
        let store = ExpiringStore::new(MemoryBackend::new(), config.default_ttl);
        let coordinator = QueryCacheCoordinator::from_config(store, &config);
        assert_eq!(coordinator.ttl_for("nearby").as_secs(), 1);
        assert_eq!(coordinator.ttl_for("within").as_secs(), 3600);

        let params = json!({"latitude": 38.6, "longitude": -90.2});
        let _: u32 = coordinator
            .resolve("nearby", &params, || async { Ok::<_, DbError>(7) })
            .await
            .unwrap();
        assert_eq!(coordinator.cached::<u32, _>("nearby", &params).await.unwrap(), Some(7));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(coordinator.cached::<u32, _>("nearby", &params).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_single_flight_runs_compute_once() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .resolve("within", &json!({"polygon": "p"}), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, DbError>(42u32)
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_leader_does_not_poison_followers() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .resolve("containing", &json!({"lat": 1}), || async move {
                        let call = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        if call == 0 {
                            Err(DbError)
                        } else {
                            Ok(call as u32)
                        }
                    })
                    .await
            }));
        }

        let mut failures = 0;
        let mut successes = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(value) => successes.push(value),
                Err(_) => failures += 1,
            }
        }

        // Only the first leader fails; the next leader's result is shared
        assert_eq!(failures, 1);
        assert_eq!(successes.len(), 3);
        assert!(successes.iter().all(|v| *v == successes[0]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_key() {
        let coordinator = coordinator();

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .resolve("nearby", &json!({"x": 1}), || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<_, DbError>(1u32)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coordinator.in_flight_len(), 1);

        leader.abort();
        let _ = leader.await;
        assert_eq!(coordinator.in_flight_len(), 0);

        let value = coordinator
            .resolve("nearby", &json!({"x": 1}), || async { Ok::<_, DbError>(2u32) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_without_single_flight() {
        let coordinator = coordinator().with_single_flight(false);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: u32 = coordinator
                .resolve("locations", &json!({}), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DbError>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let coordinator =
            QueryCacheCoordinator::new(ExpiringStore::new(NoOpBackend, Ttl::default()));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _: u32 = coordinator
                .resolve("locations", &json!({}), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DbError>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cache_result_and_invalidate() {
        let coordinator = coordinator();
        let a = json!({"id": "a"});
        let b = json!({"id": "b"});

        assert!(coordinator.cache_result("location", &a, &1u32, None).await.unwrap());
        assert!(coordinator.cache_result("location", &b, &2u32, Some(60)).await.unwrap());
        assert!(coordinator.cache_result("nearby", &a, &3u32, None).await.unwrap());
        assert!(matches!(
            coordinator.cache_result("location", &a, &1u32, Some(0)).await,
            Err(GeoCacheError::Store(_))
        ));

        assert!(coordinator.invalidate("location", &a).await.unwrap());
        assert!(!coordinator.invalidate("location", &a).await.unwrap());

        assert_eq!(coordinator.invalidate_namespace("location").await.unwrap(), 1);
        assert_eq!(coordinator.cached::<u32, _>("nearby", &a).await.unwrap(), Some(3));
    }
}
