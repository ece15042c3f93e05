// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for geocache integration tests
//!
//! Provides backends that always fail, to exercise the degradation paths
//! without a real Redis server.

#![allow(dead_code)]

use async_trait::async_trait;
use geocache::{
    CacheBackend, GeoPoint, ProximityError, ProximityIndex, ProximityResult, RadiusQuery,
    StoreError, Ttl,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Installs a test-writer subscriber honoring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Key/value backend whose every call fails as if the server were down
///
/// Counts calls so tests can check the store actually reached the backend.
#[derive(Debug, Default)]
pub struct UnreachableBackend {
    calls: AtomicUsize,
}

impl UnreachableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::unavailable(self.name(), "connection refused"))
    }
}

#[async_trait]
impl CacheBackend for UnreachableBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        self.fail()
    }

    async fn set(&self, _key: &str, _payload: String, _ttl: Ttl) -> Result<(), StoreError> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        self.fail()
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> Result<usize, StoreError> {
        self.fail()
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.fail()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.fail()
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "UnreachableBackend"
    }
}

/// Proximity index that behaves like an unreachable remote index
#[derive(Debug, Default)]
pub struct UnreachableIndex;

#[async_trait]
impl ProximityIndex for UnreachableIndex {
    async fn insert(&self, _point: GeoPoint) -> Result<bool, ProximityError> {
        Ok(false)
    }

    async fn radius_query(
        &self,
        _query: &RadiusQuery,
    ) -> Result<Vec<ProximityResult>, ProximityError> {
        Ok(Vec::new())
    }

    async fn remove(&self, _id: &str) -> bool {
        false
    }

    async fn len(&self) -> usize {
        0
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "UnreachableIndex"
    }
}

/// Census-style points around the equator used by the ordering tests
///
/// A sits at the origin, B about 111 km east and C about 556 km east.
pub fn equator_points() -> Vec<GeoPoint> {
    vec![
        GeoPoint::new("A", 0.0, 0.0),
        GeoPoint::new("B", 1.0, 0.0),
        GeoPoint::new("C", 5.0, 0.0),
    ]
}
