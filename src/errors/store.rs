// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the expiring store and its backends.

/// Errors that can occur in the expiring store.
///
/// Only [`InvalidTtl`](StoreError::InvalidTtl) and
/// [`Serialization`](StoreError::Serialization) ever reach callers of
/// [`ExpiringStore`](crate::ExpiringStore). The remaining variants are produced
/// by [`CacheBackend`](crate::CacheBackend) implementations and are converted
/// into a miss, `false` or `0` by the store after being logged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A time-to-live of zero seconds was requested.
    #[error("Invalid TTL: {seconds}s (must be a positive number of seconds)")]
    InvalidTtl {
        /// The rejected value
        seconds: u64,
    },

    /// Error serializing or deserializing a cached value.
    #[error("Serialization error: {details}")]
    Serialization {
        /// Details about the serialization error
        details: String,
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Error reading or writing a disk-backed cache file.
    #[error("Cache I/O error at {path}: {details}")]
    CacheIo {
        /// Path to the cache file that caused the error
        path: String,
        /// Details about the I/O error
        details: String,
        /// The underlying I/O error, if available
        #[source]
        source: Option<std::io::Error>,
    },

    /// The key/value backend cannot be reached.
    #[error("Cache backend '{backend}' unavailable: {details}")]
    BackendUnavailable {
        /// Name of the backend
        backend: &'static str,
        /// Details about the failure
        details: String,
    },
}

impl StoreError {
    /// Create an `InvalidTtl` error.
    pub fn invalid_ttl(seconds: u64) -> Self {
        StoreError::InvalidTtl { seconds }
    }

    /// Create a `Serialization` error from a serde_json error.
    pub fn serialization(source: serde_json::Error) -> Self {
        StoreError::Serialization {
            details: source.to_string(),
            source,
        }
    }

    /// Create a `CacheIo` error.
    pub fn cache_io(
        path: impl Into<String>,
        details: impl Into<String>,
        source: Option<std::io::Error>,
    ) -> Self {
        StoreError::CacheIo {
            path: path.into(),
            details: details.into(),
            source,
        }
    }

    /// Create a `BackendUnavailable` error.
    pub fn unavailable(backend: &'static str, details: impl Into<String>) -> Self {
        StoreError::BackendUnavailable {
            backend,
            details: details.into(),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::unavailable("RedisBackend", err.to_string())
    }
}
