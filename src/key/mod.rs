// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Deterministic cache keys for query parameter sets
//!
//! A key has the form `<prefix>:<namespace>:<digest>`, where the digest is the
//! lowercase hex SHA-256 of the parameters' canonical form (see
//! [`canonical`]). Two parameter sets that are structurally equal derive the
//! same key regardless of insertion order; any difference in a key or value
//! changes the digest.
//!
//! # Examples
//!
//! ```rust
//! use geocache::{KeyDeriver, ParameterSet};
//! use serde_json::json;
//!
//! let keys = KeyDeriver::default();
//! let a = ParameterSet::try_from(json!({"latitude": 38.6, "longitude": -90.2})).unwrap();
//! let b = ParameterSet::try_from(json!({"longitude": -90.2, "latitude": 38.6})).unwrap();
//!
//! let key = keys.derive_key("nearby", &a).unwrap();
//! assert_eq!(key, keys.derive_key("nearby", &b).unwrap());
//! assert!(key.starts_with("geo:nearby:"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::config::constants::DEFAULT_KEY_PREFIX;
use crate::errors::KeyError;

mod canonical;

/// The inputs of one logical query, keyed by parameter name
///
/// Values may be scalars, lists or nested mappings. Mapping order never
/// matters; list order does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(Map<String, Value>);

impl ParameterSet {
    /// Creates an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter set from any serializable value
    ///
    /// The value must serialize to a mapping; unit and `None` serialize to
    /// `null` and produce an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidParameter`] if serialization fails or the
    /// value is not a mapping.
    pub fn from_serialize<P: Serialize + ?Sized>(params: &P) -> Result<Self, KeyError> {
        let value = serde_json::to_value(params).map_err(KeyError::unserializable)?;
        Self::try_from(value)
    }

    /// Adds a parameter, replacing any previous value under `name`
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidParameter`] if `value` cannot be serialized.
    pub fn with<V: Serialize>(
        mut self,
        name: impl Into<String>,
        value: V,
    ) -> Result<Self, KeyError> {
        let value = serde_json::to_value(value).map_err(KeyError::unserializable)?;
        self.0.insert(name.into(), value);
        Ok(self)
    }

    /// Adds an already-converted parameter value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Looks up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of top-level parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no parameters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The canonical text form that is hashed into the key
    pub fn canonical(&self) -> Result<String, KeyError> {
        canonical::to_canonical_string(&Value::Object(self.0.clone()))
    }
}

impl TryFrom<Value> for ParameterSet {
    type Error = KeyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            Value::Bool(_) => Err(not_a_mapping("boolean")),
            Value::Number(_) => Err(not_a_mapping("number")),
            Value::String(_) => Err(not_a_mapping("string")),
            Value::Array(_) => Err(not_a_mapping("list")),
        }
    }
}

fn not_a_mapping(kind: &str) -> KeyError {
    KeyError::invalid_parameter(format!("expected a mapping, got a {kind}"))
}

impl From<Map<String, Value>> for ParameterSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Derives cache keys under a fixed prefix
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl KeyDeriver {
    /// Creates a deriver for keys starting with `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The leading key segment
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derives `<prefix>:<namespace>:<sha256 hex>` for a parameter set
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidNamespace`] for an empty namespace or one
    /// containing `:`, and [`KeyError::InvalidParameter`] if the parameters
    /// cannot be rendered canonically.
    pub fn derive_key(&self, namespace: &str, params: &ParameterSet) -> Result<String, KeyError> {
        validate_segment(namespace)?;
        let canonical = params.canonical()?;
        Ok(format!("{}:{}:{}", self.prefix, namespace, digest_hex(&canonical)))
    }

    /// Derives a key from any serializable parameter struct
    ///
    /// # Errors
    ///
    /// See [`derive_key`](Self::derive_key) and [`ParameterSet::from_serialize`].
    pub fn derive_key_for<P: Serialize + ?Sized>(
        &self,
        namespace: &str,
        params: &P,
    ) -> Result<String, KeyError> {
        let params = ParameterSet::from_serialize(params)?;
        self.derive_key(namespace, &params)
    }

    /// The prefix shared by every key of `namespace`, for bulk invalidation
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidNamespace`] for an invalid namespace.
    pub fn namespace_prefix(&self, namespace: &str) -> Result<String, KeyError> {
        validate_segment(namespace)?;
        Ok(format!("{}:{}:", self.prefix, namespace))
    }

    /// A directly addressed key, `<prefix>:<kind>:<part>[:<part>...]`
    ///
    /// Used for records looked up by identifier rather than by query, such as
    /// boundaries and demographics of one location.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidNamespace`] for an invalid `kind`, and
    /// [`KeyError::InvalidParameter`] for an empty part or one containing `:`.
    pub fn record_key(&self, kind: &str, parts: &[&str]) -> Result<String, KeyError> {
        validate_segment(kind)?;
        let mut key = format!("{}:{}", self.prefix, kind);
        for part in parts {
            if part.is_empty() || part.contains(':') {
                return Err(KeyError::invalid_parameter(format!(
                    "record key part '{part}' must be non-empty and must not contain ':'"
                )));
            }
            key.push(':');
            key.push_str(part);
        }
        Ok(key)
    }
}

fn validate_segment(namespace: &str) -> Result<(), KeyError> {
    if namespace.is_empty() {
        return Err(KeyError::invalid_namespace(namespace, "must not be empty"));
    }
    if namespace.contains(':') {
        return Err(KeyError::invalid_namespace(namespace, "must not contain ':'"));
    }
    Ok(())
}

/// Lowercase hex SHA-256 of `canonical`
pub fn digest_hex(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn params(value: Value) -> ParameterSet {
        ParameterSet::try_from(value).unwrap()
    }

    #[test]
    fn test_empty_params_key() {
        let keys = KeyDeriver::default();
        assert_eq!(
            keys.derive_key("locations", &ParameterSet::new()).unwrap(),
            "geo:locations:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_golden_digest() {
        let keys = KeyDeriver::default();
        let key = keys
            .derive_key("within", &params(json!({"b": [1, 2], "a": {"y": 1.5, "x": "s"}})))
            .unwrap();
        assert_eq!(
            key,
            "geo:within:b55eb5705f28351d2dfe313733ca9d1b44cb8a76b0e6d74b34baf0669d683529"
        );
    }

    #[test]
    fn test_nested_order_is_irrelevant() {
        let keys = KeyDeriver::default();
        let a = params(json!({
            "polygon": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]},
            "limit": 20
        }));
        let b = params(json!({
            "limit": 20,
            "polygon": {"coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]], "type": "Polygon"}
        }));
        assert_eq!(
            keys.derive_key("within", &a).unwrap(),
            keys.derive_key("within", &b).unwrap()
        );
    }

    #[test]
    fn test_list_order_matters() {
        let keys = KeyDeriver::default();
        let a = params(json!({"types": ["county", "state"]}));
        let b = params(json!({"types": ["state", "county"]}));
        assert_ne!(
            keys.derive_key("nearby", &a).unwrap(),
            keys.derive_key("nearby", &b).unwrap()
        );
    }

    #[test]
    fn test_namespace_and_prefix_discriminate() {
        let p = params(json!({"type": "county"}));
        let geo = KeyDeriver::default();
        let other = KeyDeriver::new("census");

        let nearby = geo.derive_key("nearby", &p).unwrap();
        let within = geo.derive_key("within", &p).unwrap();
        assert_ne!(nearby, within);
        assert!(other.derive_key("nearby", &p).unwrap().starts_with("census:nearby:"));
    }

    #[test]
    fn test_struct_and_map_agree() {
        #[derive(Serialize)]
        struct Nearby {
            longitude: f64,
            latitude: f64,
            distance_meters: f64,
            types: Option<Vec<String>>,
            limit: u32,
        }

        let keys = KeyDeriver::default();
        let from_struct = keys
            .derive_key_for(
                "nearby",
                &Nearby {
                    longitude: -90.2,
                    latitude: 38.6,
                    distance_meters: 10000.0,
                    types: None,
                    limit: 20,
                },
            )
            .unwrap();

        let mut map = HashMap::new();
        map.insert("limit", json!(20));
        map.insert("types", Value::Null);
        map.insert("distance_meters", json!(10000.0));
        map.insert("latitude", json!(38.6));
        map.insert("longitude", json!(-90.2));
        let from_map = keys.derive_key_for("nearby", &map).unwrap();

        assert_eq!(from_struct, from_map);
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "x");
        let err = KeyDeriver::default().derive_key_for("nearby", &map).unwrap_err();
        assert!(matches!(err, KeyError::InvalidParameter { .. }));
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = ParameterSet::from_serialize(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidParameter { .. }));
        assert!(ParameterSet::from_serialize(&()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_namespace() {
        let keys = KeyDeriver::default();
        assert!(matches!(
            keys.derive_key("", &ParameterSet::new()),
            Err(KeyError::InvalidNamespace { .. })
        ));
        assert!(matches!(
            keys.derive_key("near:by", &ParameterSet::new()),
            Err(KeyError::InvalidNamespace { .. })
        ));
    }

    #[test]
    fn test_builder_with() {
        let p = ParameterSet::new()
            .with("type", "county")
            .unwrap()
            .with("limit", 100)
            .unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.get("type"), Some(&json!("county")));
    }

    #[test]
    fn test_namespace_prefix() {
        let keys = KeyDeriver::default();
        let prefix = keys.namespace_prefix("nearby").unwrap();
        assert_eq!(prefix, "geo:nearby:");
        let key = keys.derive_key("nearby", &ParameterSet::new()).unwrap();
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn test_record_key() {
        let keys = KeyDeriver::default();
        assert_eq!(
            keys.record_key("demographics", &["0500000US29510", "population"])
                .unwrap(),
            "geo:demographics:0500000US29510:population"
        );
        assert_eq!(
            keys.record_key("boundary", &["0400000US29"]).unwrap(),
            "geo:boundary:0400000US29"
        );
        assert!(keys.record_key("boundary", &["a:b"]).is_err());
        assert!(keys.record_key("boundary", &[""]).is_err());
    }
}
