// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the geocache library.
//!
//! This module provides strongly-typed errors for all public APIs in geocache.
//! It follows a hybrid approach:
//!
//! - **Module-specific errors** for fine-grained error handling (`KeyError`,
//!   `StoreError`, etc.)
//! - **Unified error type** (`GeoCacheError`) for convenience when you don't need
//!   to distinguish between error sources
//!
//! # Architecture
//!
//! Each major module has its own error type:
//! - [`KeyError`] - Parameter sets or namespaces that cannot be turned into a key
//! - [`StoreError`] - TTL validation, serialization and backend failures
//! - [`ProximityError`] - Invalid coordinates, radii and index backend failures
//! - [`ConfigError`] - Configuration that cannot be turned into live handles
//! - [`ResolveError`] - Failures of a cached resolution, generic over the
//!   caller's compute error
//!
//! Backend failures (`StoreError::BackendUnavailable`,
//! `ProximityError::BackendUnavailable`) are internal: the public store and
//! index operations log them and degrade to a miss instead of returning them.
//!
//! # Examples
//!
//! ```rust,ignore
//! use geocache::{QueryCacheCoordinator, ResolveError};
//!
//! match coordinator.resolve("nearby", &params, || query_database(&params)).await {
//!     Ok(locations) => render(locations),
//!     Err(ResolveError::Key(e)) => panic!("bad parameters: {e}"),
//!     Err(ResolveError::Compute(e)) => return Err(e.into()),
//! }
//! ```

mod config;
mod key;
mod proximity;
mod resolve;
mod store;

pub use config::ConfigError;
pub use key::KeyError;
pub use proximity::ProximityError;
pub use resolve::ResolveError;
pub use store::StoreError;

/// Unified error type for all geocache operations.
///
/// All module-specific error types automatically convert to `GeoCacheError` via
/// `From` implementations, so you can use `?` to propagate errors naturally.
/// [`ResolveError`] is generic over the caller's error and is not wrapped here;
/// use [`ResolveError::into_compute`] or match on it directly.
#[derive(Debug, thiserror::Error)]
pub enum GeoCacheError {
    /// Error deriving a cache key.
    #[error("Key derivation error: {0}")]
    Key(#[from] KeyError),

    /// Error from the expiring store.
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the proximity index.
    #[error("Proximity index error: {0}")]
    Proximity(#[from] ProximityError),

    /// Error building handles from configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
