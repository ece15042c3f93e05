// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for cache key derivation.

/// Errors that can occur while deriving a cache key.
///
/// Both variants are caller bugs: they are raised synchronously and are never
/// swallowed by the cache layer.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The parameter set could not be serialized into a canonical mapping.
    ///
    /// This occurs when a `Serialize` implementation fails (for example a map
    /// with non-string keys) or when the top-level value is not a mapping.
    #[error("Invalid query parameters: {reason}")]
    InvalidParameter {
        /// Description of why the parameters were rejected
        reason: String,
        /// The underlying serialization error, if any
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The namespace cannot be used as a key segment.
    #[error("Invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        /// The rejected namespace
        namespace: String,
        /// Description of why the namespace was rejected
        reason: &'static str,
    },
}

impl KeyError {
    /// Create an `InvalidParameter` error with a reason and no source.
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        KeyError::InvalidParameter {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create an `InvalidParameter` error from a serialization failure.
    pub fn unserializable(source: serde_json::Error) -> Self {
        KeyError::InvalidParameter {
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an `InvalidNamespace` error.
    pub fn invalid_namespace(namespace: impl Into<String>, reason: &'static str) -> Self {
        KeyError::InvalidNamespace {
            namespace: namespace.into(),
            reason,
        }
    }
}
