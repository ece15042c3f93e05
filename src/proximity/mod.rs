// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Secondary geospatial index for radius lookups
//!
//! A [`ProximityIndex`] answers "which known points lie within this distance
//! of a coordinate" without going back to the primary spatial store. Two
//! implementations are provided:
//!
//! - [`GridIndex`]: In-process index bucketing points into fixed-size
//!   latitude/longitude cells
//! - `RedisGeoIndex` (feature `redis`): Redis GEO sorted set
//!
//! # Examples
//!
//! ```rust
//! use geocache::{DistanceUnit, GeoPoint, GridIndex, ProximityIndex, RadiusQuery};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let index = GridIndex::new();
//! index.insert(GeoPoint::new("stl", -90.199, 38.627)).await.unwrap();
//! index.insert(GeoPoint::new("kc", -94.578, 39.099)).await.unwrap();
//!
//! let query = RadiusQuery::new(-90.2, 38.6, 50.0, DistanceUnit::Kilometers);
//! let found = index.radius_query(&query).await.unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].id, "stl");
//! # });
//! ```

use async_trait::async_trait;

use crate::errors::ProximityError;
use crate::types::geo::{GeoPoint, ProximityResult, RadiusQuery};

mod grid;
#[cfg(feature = "redis")]
mod redis;

pub use grid::GridIndex;
#[cfg(feature = "redis")]
pub use redis::RedisGeoIndex;

/// Trait for proximity index backends
///
/// # Consistency
///
/// Each id maps to at most one coordinate pair. Concurrent inserts of one id
/// resolve last-writer-wins, and a query running alongside an insert sees the
/// point either before or after it, never a mix.
///
/// # Error Handling
///
/// Only caller mistakes are returned as errors. A backend that cannot be
/// reached is logged and reported as `Ok(false)`, an empty result, `false`
/// or `0`.
#[async_trait]
pub trait ProximityIndex: Send + Sync {
    /// Adds a point, replacing any coordinates previously stored for its id
    ///
    /// Returns `Ok(false)` if the backend could not take the write.
    async fn insert(&self, point: GeoPoint) -> Result<bool, ProximityError>;

    /// Returns every point within `query.radius` of the center, nearest first
    ///
    /// The radius is inclusive, distances are in `query.unit`, ties are broken
    /// by id and the result is truncated to `query.max_results`.
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::InvalidRadius`] for a negative or non-finite
    /// radius.
    async fn radius_query(&self, query: &RadiusQuery)
        -> Result<Vec<ProximityResult>, ProximityError>;

    /// Removes a point; returns whether it was present
    async fn remove(&self, id: &str) -> bool;

    /// Number of indexed points
    async fn len(&self) -> usize;

    /// `true` when no points are indexed
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reports whether the backend is reachable
    async fn health_check(&self) -> bool;

    /// Returns a human-readable name for this backend
    fn name(&self) -> &'static str;
}

/// Validates the radius of `query`
pub(crate) fn check_radius(query: &RadiusQuery) -> Result<(), ProximityError> {
    if query.has_valid_radius() {
        Ok(())
    } else {
        Err(ProximityError::InvalidRadius {
            radius: query.radius,
        })
    }
}

/// Orders results by ascending distance, then id, and applies the limit
pub(crate) fn finish_results(
    mut results: Vec<ProximityResult>,
    max_results: Option<usize>,
) -> Vec<ProximityResult> {
    results.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(max_results) = max_results {
        results.truncate(max_results);
    }
    results
}
