// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for configuration loading and handle construction.

use super::{ProximityError, StoreError};

/// Errors that can occur while loading configuration or connecting backends.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An option has a value that cannot be used.
    #[error("Invalid value for {option}: {reason}")]
    InvalidValue {
        /// Name of the option or environment variable
        option: &'static str,
        /// Description of why the value was rejected
        reason: String,
    },

    /// A backend endpoint could not be parsed.
    #[error("Invalid backend endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        /// The rejected endpoint
        endpoint: String,
        /// The underlying parse error
        #[source]
        source: url::ParseError,
    },

    /// A backend could not be opened.
    #[error("Failed to open cache backend: {0}")]
    Store(#[from] StoreError),

    /// A proximity index backend could not be opened.
    #[error("Failed to open proximity index: {0}")]
    Proximity(#[from] ProximityError),

    /// A backend requires a cargo feature that was not enabled.
    #[error("Backend '{backend}' requires the '{feature}' feature")]
    FeatureDisabled {
        /// Name of the backend
        backend: &'static str,
        /// Cargo feature that enables it
        feature: &'static str,
    },
}

impl ConfigError {
    /// Create an `InvalidValue` error.
    pub fn invalid_value(option: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            option,
            reason: reason.into(),
        }
    }
}
