// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for geocache operations.
//!
//! Telemetry is kept apart from the cache logic: instead of `#[instrument]`
//! attributes, each instrumented operation has a span helper here and attaches
//! it to its future.
//!
//! Usage pattern:
//! ```rust,ignore
//! pub async fn my_operation(&self, param: &str) -> T {
//!     let span = spans::my_operation(param);
//!     async { /* cache logic */ }.instrument(span).await
//! }
//! ```

use tracing::Span;

use crate::types::geo::RadiusQuery;

/// Create span for resolving a query through the cache.
///
/// This is the main entry point for cached lookups.
///
/// Parent: None (root span for this operation)
/// Children: the caller's compute future on a miss
#[inline]
pub(crate) fn resolve(namespace: &str, key: &str) -> Span {
    tracing::info_span!(
        "geocache.resolve",
        namespace = namespace,
        key = key,
        outcome = tracing::field::Empty,
    )
}

/// Create span for bulk invalidation by key prefix.
///
/// Parent: Caller span (e.g. a namespace invalidation)
/// Children: None
#[inline]
pub(crate) fn invalidate_prefix(prefix: &str, backend: &'static str) -> Span {
    tracing::info_span!(
        "geocache.invalidate_prefix",
        prefix = prefix,
        backend = backend,
    )
}

/// Create span for a proximity radius query.
///
/// Parent: Caller span
/// Children: None
#[inline]
pub(crate) fn radius_query(query: &RadiusQuery, backend: &'static str) -> Span {
    tracing::debug_span!(
        "geocache.radius_query",
        longitude = query.longitude,
        latitude = query.latitude,
        radius = query.radius,
        unit = %query.unit,
        max_results = query.max_results.map(|n| n as u64),
        backend = backend,
    )
}

/// Create span for a combined health probe of the cache and the index.
///
/// Parent: None (root span for this operation)
/// Children: None
#[inline]
pub(crate) fn health(store_backend: &'static str, index_backend: &'static str) -> Span {
    tracing::debug_span!(
        "geocache.health",
        store_backend = store_backend,
        index_backend = index_backend,
    )
}
