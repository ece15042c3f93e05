// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for radius queries through the ProximityIndex trait

mod helpers;

use geocache::{
    haversine_meters, DistanceUnit, GeoPoint, GridIndex, ProximityError, ProximityIndex,
    RadiusQuery,
};
use std::sync::Arc;

async fn seeded(index: &dyn ProximityIndex) {
    for point in helpers::equator_points() {
        assert!(index.insert(point).await.unwrap());
    }
}

fn ids(results: &[geocache::ProximityResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn test_results_ordered_by_distance() {
    let index = GridIndex::new();
    seeded(&index).await;

    let query = RadiusQuery::new(0.0, 0.0, 600.0, DistanceUnit::Kilometers);
    let results = index.radius_query(&query).await.unwrap();

    assert_eq!(ids(&results), vec!["A", "B", "C"]);
    assert!(results[0].distance.abs() < 1e-9);
    assert!((results[1].distance - 111.2).abs() < 0.1);
    assert!((results[2].distance - 556.0).abs() < 0.5);
}

#[tokio::test]
async fn test_points_beyond_radius_excluded() {
    let index = GridIndex::new();
    seeded(&index).await;

    let query = RadiusQuery::new(0.0, 0.0, 200.0, DistanceUnit::Kilometers);
    let results = index.radius_query(&query).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
}

#[tokio::test]
async fn test_max_results_truncates_nearest_first() {
    let index = GridIndex::new();
    seeded(&index).await;

    let query = RadiusQuery::new(0.0, 0.0, 600.0, DistanceUnit::Kilometers).limit(2);
    let results = index.radius_query(&query).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
}

#[tokio::test]
async fn test_radius_is_inclusive() {
    let index = GridIndex::new();
    seeded(&index).await;

    let exact = GeoPoint::new("B", 1.0, 0.0).distance_meters_to(0.0, 0.0);
    assert!((exact - haversine_meters(0.0, 0.0, 1.0, 0.0)).abs() < 1e-6);
    let query = RadiusQuery::new(0.0, 0.0, exact, DistanceUnit::Meters);
    let results = index.radius_query(&query).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
}

#[tokio::test]
async fn test_reinsert_moves_point() {
    let index = GridIndex::new();
    seeded(&index).await;

    index.insert(GeoPoint::new("C", 0.5, 0.0)).await.unwrap();
    assert_eq!(index.len().await, 3);

    let query = RadiusQuery::new(0.0, 0.0, 100.0, DistanceUnit::Kilometers);
    let results = index.radius_query(&query).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "C"]);
}

#[tokio::test]
async fn test_miles_and_feet() {
    let index = GridIndex::new();
    seeded(&index).await;

    let miles = RadiusQuery::new(0.0, 0.0, 70.0, DistanceUnit::Miles);
    let results = index.radius_query(&miles).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
    assert!((results[1].distance - 69.1).abs() < 0.1);

    let feet = RadiusQuery::new(0.0, 0.0, 1000.0, DistanceUnit::Feet);
    let results = index.radius_query(&feet).await.unwrap();
    assert_eq!(ids(&results), vec!["A"]);
}

#[tokio::test]
async fn test_negative_radius_rejected() {
    let index = GridIndex::new();
    let query = RadiusQuery::new(0.0, 0.0, -1.0, DistanceUnit::Kilometers);
    assert!(matches!(
        index.radius_query(&query).await,
        Err(ProximityError::InvalidRadius { .. })
    ));
}

#[tokio::test]
async fn test_strict_index_rejects_out_of_range() {
    let strict = GridIndex::new().strict();
    assert!(matches!(
        strict.insert(GeoPoint::new("bad", 200.0, 0.0)).await,
        Err(ProximityError::InvalidCoordinate { .. })
    ));
    assert!(strict.is_empty().await);

    let permissive = GridIndex::new();
    assert!(permissive.insert(GeoPoint::new("odd", 0.0, 95.0)).await.unwrap());
    assert_eq!(permissive.len().await, 1);
}

#[tokio::test]
async fn test_shared_index_across_tasks() {
    let index: Arc<dyn ProximityIndex> = Arc::new(GridIndex::new());

    let mut handles = Vec::new();
    for i in 0..50 {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            let lon = f64::from(i) * 0.01;
            index
                .insert(GeoPoint::new(format!("p{i}"), lon, 0.0))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(index.len().await, 50);
    let query = RadiusQuery::new(0.0, 0.0, 1000.0, DistanceUnit::Kilometers);
    let results = index.radius_query(&query).await.unwrap();
    assert_eq!(results.len(), 50);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}
