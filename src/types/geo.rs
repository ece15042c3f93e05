// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Geospatial value types shared by every proximity index backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Earth radius in meters used for great-circle distances.
///
/// This is the value Redis GEO commands use, so the in-process index and the
/// Redis index agree on distances to the millimeter.
pub const EARTH_RADIUS_METERS: f64 = 6_372_797.560_856;

/// A named point, longitude first (x, y)
///
/// Coordinates are degrees with WGS84 semantics. They are not validated here;
/// see [`GeoPoint::is_in_range`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Identifier, unique within an index
    pub id: String,
    /// Longitude in degrees
    pub longitude: f64,
    /// Latitude in degrees
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a new point
    pub fn new(id: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            id: id.into(),
            longitude,
            latitude,
        }
    }

    /// Returns `true` when longitude is within -180..=180 and latitude within -90..=90
    pub fn is_in_range(&self) -> bool {
        (-180.0..=180.0).contains(&self.longitude) && (-90.0..=90.0).contains(&self.latitude)
    }

    /// Great-circle distance to a coordinate, in meters
    pub fn distance_meters_to(&self, longitude: f64, latitude: f64) -> f64 {
        haversine_meters(self.longitude, self.latitude, longitude, latitude)
    }
}

/// Great-circle distance between two coordinates, in meters
///
/// # Examples
///
/// ```
/// use geocache::haversine_meters;
///
/// // One degree of latitude is roughly 111 km
/// let d = haversine_meters(0.0, 0.0, 0.0, 1.0);
/// assert!((d - 111_226.3).abs() < 1.0);
/// ```
pub fn haversine_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let lat1r = lat1.to_radians();
    let lat2r = lat2.to_radians();
    let u = ((lat2r - lat1r) / 2.0).sin();
    let v = ((lon2 - lon1).to_radians() / 2.0).sin();
    let a = u * u + lat1r.cos() * lat2r.cos() * v * v;
    2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
}

/// Distance units accepted by radius queries
///
/// Parsed from the Redis GEO spellings `m`, `km`, `mi` and `ft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    /// Meters (canonical unit)
    #[default]
    Meters,
    /// Kilometers
    Kilometers,
    /// International miles
    Miles,
    /// International feet
    Feet,
}

impl DistanceUnit {
    /// Number of meters in one of this unit
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.34,
            DistanceUnit::Feet => 0.3048,
        }
    }

    /// Converts a distance in this unit to meters
    pub fn to_meters(&self, distance: f64) -> f64 {
        distance * self.meters_per_unit()
    }

    /// Converts a distance in meters to this unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }

    /// The Redis GEO spelling of this unit
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Feet => "ft",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown distance unit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown distance unit '{0}' (expected m, km, mi or ft)")]
pub struct UnknownUnit(pub String);

impl FromStr for DistanceUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "meters" => Ok(DistanceUnit::Meters),
            "km" | "kilometers" => Ok(DistanceUnit::Kilometers),
            "mi" | "miles" => Ok(DistanceUnit::Miles),
            "ft" | "feet" => Ok(DistanceUnit::Feet),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}

/// A point found by a radius query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityResult {
    /// Identifier of the matched point
    pub id: String,
    /// Distance from the query center, in the query's unit
    pub distance: f64,
}

/// Parameters of a radius query
///
/// # Examples
///
/// ```
/// use geocache::{DistanceUnit, RadiusQuery};
///
/// let query = RadiusQuery::new(-73.98, 40.75, 25.0, DistanceUnit::Miles).limit(10);
/// assert_eq!(query.radius_meters(), 25.0 * 1609.34);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusQuery {
    /// Longitude of the center, in degrees
    pub longitude: f64,
    /// Latitude of the center, in degrees
    pub latitude: f64,
    /// Search radius in `unit`
    pub radius: f64,
    /// Unit of `radius` and of the returned distances
    pub unit: DistanceUnit,
    /// Maximum number of results, nearest first
    pub max_results: Option<usize>,
}

impl RadiusQuery {
    /// Creates an unbounded query around a center
    pub fn new(longitude: f64, latitude: f64, radius: f64, unit: DistanceUnit) -> Self {
        Self {
            longitude,
            latitude,
            radius,
            unit,
            max_results: None,
        }
    }

    /// Truncates results to the `max_results` nearest points
    pub fn limit(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// The radius converted to meters
    pub fn radius_meters(&self) -> f64 {
        self.unit.to_meters(self.radius)
    }

    /// `true` for a finite, non-negative radius
    pub fn has_valid_radius(&self) -> bool {
        self.radius.is_finite() && self.radius >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_meters(12.5, 41.9, 12.5, 41.9), 0.0);
    }

    #[test]
    fn haversine_is_symmetric() {
        let ab = haversine_meters(-122.42, 37.77, -73.98, 40.75);
        let ba = haversine_meters(-73.98, 40.75, -122.42, 37.77);
        assert!((ab - ba).abs() < 1e-6);
        // San Francisco to New York is a bit over 4,100 km
        assert!((4_120_000.0..4_140_000.0).contains(&ab));
    }

    #[test]
    fn haversine_crosses_antimeridian() {
        let d = haversine_meters(179.5, 0.0, -179.5, 0.0);
        assert!((d - 111_226.3).abs() < 1.0);
    }

    #[test]
    fn unit_conversions_round_trip() {
        for unit in [
            DistanceUnit::Meters,
            DistanceUnit::Kilometers,
            DistanceUnit::Miles,
            DistanceUnit::Feet,
        ] {
            let meters = unit.to_meters(42.0);
            assert!((unit.from_meters(meters) - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unit_parsing() {
        assert_eq!("km".parse::<DistanceUnit>().unwrap(), DistanceUnit::Kilometers);
        assert_eq!("MI".parse::<DistanceUnit>().unwrap(), DistanceUnit::Miles);
        assert_eq!("feet".parse::<DistanceUnit>().unwrap(), DistanceUnit::Feet);
        assert!("furlong".parse::<DistanceUnit>().is_err());
    }

    #[test]
    fn point_range_check() {
        assert!(GeoPoint::new("a", -180.0, 90.0).is_in_range());
        assert!(!GeoPoint::new("b", 181.0, 0.0).is_in_range());
        assert!(!GeoPoint::new("c", 0.0, -90.5).is_in_range());
        assert!(!GeoPoint::new("d", f64::NAN, 0.0).is_in_range());
    }

    #[test]
    fn radius_validation() {
        assert!(RadiusQuery::new(0.0, 0.0, 0.0, DistanceUnit::Meters).has_valid_radius());
        assert!(!RadiusQuery::new(0.0, 0.0, -1.0, DistanceUnit::Meters).has_valid_radius());
        let unbounded = RadiusQuery::new(0.0, 0.0, f64::INFINITY, DistanceUnit::Meters);
        assert!(!unbounded.has_valid_radius());
    }
}
