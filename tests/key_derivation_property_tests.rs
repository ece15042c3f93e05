// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for cache key derivation
//!
//! These tests use proptest to check that keys are stable under parameter
//! reordering and discriminate between different parameter values.

use geocache::{KeyDeriver, ParameterSet};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// Helper to generate leaf parameter values
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[a-zA-Z0-9 _:\"\\\\-]{0,12}".prop_map(Value::from),
    ]
}

// Helper to generate nested parameter values, two levels deep
fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_params() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z_]{1,8}", arb_value(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

fn build(entries: impl IntoIterator<Item = (String, Value)>) -> ParameterSet {
    let mut params = ParameterSet::new();
    for (name, value) in entries {
        params.insert(name, value);
    }
    params
}

proptest! {
    /// Property: insertion order of parameters never changes the key
    #[test]
    fn prop_key_ignores_parameter_order(entries in arb_params()) {
        let deriver = KeyDeriver::default();
        let forward = build(entries.clone());
        let reversed = build(entries.into_iter().rev());

        prop_assert_eq!(
            deriver.derive_key("nearby", &forward).unwrap(),
            deriver.derive_key("nearby", &reversed).unwrap()
        );
    }

    /// Property: keys have the `<prefix>:<namespace>:<64 hex>` shape
    #[test]
    fn prop_key_shape(entries in arb_params(), namespace in "[a-z]{1,12}") {
        let key = KeyDeriver::default().derive_key(&namespace, &build(entries)).unwrap();
        let expected_prefix = format!("geo:{namespace}:");

        prop_assert!(key.starts_with(&expected_prefix));
        let digest = &key[expected_prefix.len()..];
        prop_assert_eq!(digest.len(), 64);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Property: changing one parameter's value changes the key
    #[test]
    fn prop_key_discriminates_values(
        entries in arb_params(),
        name in "[a-z_]{1,8}",
        a in arb_value(),
        b in arb_value(),
    ) {
        prop_assume!(a != b);
        let deriver = KeyDeriver::default();

        let mut with_a = build(entries.clone());
        with_a.insert(name.clone(), a);
        let mut with_b = build(entries);
        with_b.insert(name, b);

        prop_assert_ne!(
            deriver.derive_key("within", &with_a).unwrap(),
            deriver.derive_key("within", &with_b).unwrap()
        );
    }

    /// Property: the same parameters under different namespaces never collide
    #[test]
    fn prop_key_separates_namespaces(entries in arb_params()) {
        let deriver = KeyDeriver::default();
        let params = build(entries);
        prop_assert_ne!(
            deriver.derive_key("nearby", &params).unwrap(),
            deriver.derive_key("containing", &params).unwrap()
        );
    }
}

#[test]
fn test_nested_mapping_order_is_irrelevant() {
    let deriver = KeyDeriver::default();
    let a: ParameterSet = json!({"filter": {"state": "MO", "type": "county"}, "limit": 10})
        .try_into()
        .unwrap();

    let mut inner = Map::new();
    inner.insert("type".into(), json!("county"));
    inner.insert("state".into(), json!("MO"));
    let mut outer = Map::new();
    outer.insert("limit".into(), json!(10));
    outer.insert("filter".into(), Value::Object(inner));
    let b = ParameterSet::from(outer);

    assert_eq!(
        deriver.derive_key("locations", &a).unwrap(),
        deriver.derive_key("locations", &b).unwrap()
    );
}

#[test]
fn test_list_order_is_significant() {
    let deriver = KeyDeriver::default();
    let a: ParameterSet = json!({"ids": [1, 2]}).try_into().unwrap();
    let b: ParameterSet = json!({"ids": [2, 1]}).try_into().unwrap();
    assert_ne!(
        deriver.derive_key("locations", &a).unwrap(),
        deriver.derive_key("locations", &b).unwrap()
    );
}

#[test]
fn test_typed_parameters_match_dynamic_ones() {
    #[derive(serde::Serialize)]
    struct NearbyQuery {
        longitude: f64,
        latitude: f64,
        radius_km: u32,
    }

    let deriver = KeyDeriver::default();
    let typed = deriver
        .derive_key_for(
            "nearby",
            &NearbyQuery {
                longitude: -90.199,
                latitude: 38.627,
                radius_km: 10,
            },
        )
        .unwrap();
    let dynamic = deriver
        .derive_key(
            "nearby",
            &ParameterSet::new()
                .with("radius_km", 10)
                .unwrap()
                .with("latitude", 38.627)
                .unwrap()
                .with("longitude", -90.199)
                .unwrap(),
        )
        .unwrap();

    assert_eq!(typed, dynamic);
}
