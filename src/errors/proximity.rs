// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the proximity index.

/// Errors that can occur in proximity index operations.
#[derive(Debug, thiserror::Error)]
pub enum ProximityError {
    /// A coordinate lies outside the WGS84 range.
    ///
    /// Only raised by indexes constructed in strict mode; the default index
    /// accepts any coordinate.
    #[error("Invalid coordinate for '{id}': longitude {longitude}, latitude {latitude}")]
    InvalidCoordinate {
        /// Identifier of the rejected point
        id: String,
        /// Rejected longitude in degrees
        longitude: f64,
        /// Rejected latitude in degrees
        latitude: f64,
    },

    /// A radius query was issued with a negative or non-finite radius.
    #[error("Invalid search radius: {radius}")]
    InvalidRadius {
        /// The rejected radius, in the query's unit
        radius: f64,
    },

    /// The index backend cannot be reached.
    #[error("Proximity backend '{backend}' unavailable: {details}")]
    BackendUnavailable {
        /// Name of the backend
        backend: &'static str,
        /// Details about the failure
        details: String,
    },
}

impl ProximityError {
    /// Create a `BackendUnavailable` error.
    pub fn unavailable(backend: &'static str, details: impl Into<String>) -> Self {
        ProximityError::BackendUnavailable {
            backend,
            details: details.into(),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for ProximityError {
    fn from(err: redis::RedisError) -> Self {
        ProximityError::unavailable("RedisGeoIndex", err.to_string())
    }
}
