// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for cached query resolution.

use super::KeyError;

/// Errors returned by [`QueryCacheCoordinator::resolve`](crate::QueryCacheCoordinator::resolve).
///
/// Generic over `E`, the error type of the caller-supplied compute future, so
/// that compute failures propagate unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError<E> {
    /// The parameters could not be turned into a cache key; compute was not run.
    #[error("Key derivation error: {0}")]
    Key(#[from] KeyError),

    /// The compute future failed. Nothing was cached.
    #[error("Compute error: {0}")]
    Compute(#[source] E),
}

impl<E> ResolveError<E> {
    /// Returns the compute error, if this is one.
    pub fn into_compute(self) -> Option<E> {
        match self {
            ResolveError::Compute(e) => Some(e),
            ResolveError::Key(_) => None,
        }
    }

    /// Returns `true` if the failure came from the compute future.
    pub fn is_compute(&self) -> bool {
        matches!(self, ResolveError::Compute(_))
    }
}
