// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Versioned envelope around cached values
//!
//! Every payload handed to a backend is the JSON text of
//! `{"v": <version>, "value": <value>}`. A payload with another version, or
//! one that does not decode into the requested type, is reported as such so
//! the store can treat it as a miss.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;

/// Current envelope format version
pub(crate) const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    v: u32,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    v: u32,
    value: Value,
}

/// Outcome of decoding a stored payload
#[derive(Debug)]
pub(crate) enum Decoded<T> {
    /// The payload held a current-version value of the requested type
    Value(T),
    /// The payload was written by another envelope version
    VersionMismatch(u32),
    /// The payload is not an envelope, or its value does not fit the type
    Malformed(serde_json::Error),
}

/// Wraps `value` in the current envelope and renders it as JSON text
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(&EnvelopeRef {
        v: ENVELOPE_VERSION,
        value,
    })
    .map_err(StoreError::serialization)
}

/// Unwraps a payload produced by [`encode`]
pub(crate) fn decode<T: DeserializeOwned>(payload: &str) -> Decoded<T> {
    let envelope: Envelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => return Decoded::Malformed(e),
    };

    if envelope.v != ENVELOPE_VERSION {
        return Decoded::VersionMismatch(envelope.v);
    }

    match serde_json::from_value(envelope.value) {
        Ok(value) => Decoded::Value(value),
        Err(e) => Decoded::Malformed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_tagged_value() {
        let payload = encode(&json!([{"id": "29510"}])).unwrap();
        assert_eq!(payload, r#"{"v":1,"value":[{"id":"29510"}]}"#);
    }

    #[test]
    fn decodes_current_version() {
        let payload = encode(&vec![1u32, 2, 3]).unwrap();
        match decode::<Vec<u32>>(&payload) {
            Decoded::Value(v) => assert_eq!(v, vec![1, 2, 3]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_version_is_reported() {
        let payload = r#"{"v":2,"value":"x"}"#;
        assert!(matches!(
            decode::<String>(payload),
            Decoded::VersionMismatch(2)
        ));
    }

    #[test]
    fn bare_value_is_malformed() {
        assert!(matches!(decode::<String>(r#""x""#), Decoded::Malformed(_)));
        assert!(matches!(decode::<String>("not json"), Decoded::Malformed(_)));
    }

    #[test]
    fn type_mismatch_is_malformed() {
        let payload = encode("a string").unwrap();
        assert!(matches!(decode::<Vec<u32>>(&payload), Decoded::Malformed(_)));
    }
}
