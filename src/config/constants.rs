// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Well-known namespaces, defaults and environment variable names
//!
//! This module centralizes magic constants used throughout the geocache crate.

/// Default key prefix shared by every cache key
pub const DEFAULT_KEY_PREFIX: &str = "geo";

/// Default time-to-live for cache entries, in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Default edge length of a grid index cell, in degrees
pub const DEFAULT_CELL_SIZE_DEGREES: f64 = 1.0;

/// Redis sorted set holding proximity index members
pub const DEFAULT_GEO_SET_KEY: &str = "geo:points";

/// Query families served by the lookup service
pub mod namespaces {
    /// Locations within a distance of a point
    pub const NEARBY: &str = "nearby";
    /// Locations inside a polygon
    pub const WITHIN: &str = "within";
    /// Regions containing a point
    pub const CONTAINING: &str = "containing";
    /// Paged location listings
    pub const LOCATIONS: &str = "locations";
    /// Single location lookups
    pub const LOCATION: &str = "location";
    /// Demographic records for a location
    pub const DEMOGRAPHICS: &str = "demographics";
    /// Demographic time series
    pub const TIMESERIES: &str = "timeseries";
    /// Boundary GeoJSON for a location
    pub const BOUNDARY: &str = "boundary";
}

/// Environment variables read by [`GeoCacheConfig::from_env`](crate::GeoCacheConfig::from_env)
pub mod env {
    /// Redis host; enables the Redis backends when set
    pub const REDIS_HOST: &str = "REDIS_HOST";
    /// Redis port (default 6379)
    pub const REDIS_PORT: &str = "REDIS_PORT";
    /// Redis password
    pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
    /// Redis database number (default 0)
    pub const REDIS_DB: &str = "REDIS_DB";
    /// Default TTL in seconds
    pub const CACHE_TTL: &str = "CACHE_TTL";
    /// Key prefix
    pub const KEY_PREFIX: &str = "GEOCACHE_KEY_PREFIX";
    /// Path of a disk cache file; selects the disk backend when set
    pub const DISK_PATH: &str = "GEOCACHE_DISK_PATH";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_valid_key_segments() {
        for ns in [
            namespaces::NEARBY,
            namespaces::WITHIN,
            namespaces::CONTAINING,
            namespaces::LOCATIONS,
            namespaces::LOCATION,
            namespaces::DEMOGRAPHICS,
            namespaces::TIMESERIES,
            namespaces::BOUNDARY,
        ] {
            assert!(!ns.is_empty());
            assert!(!ns.contains(':'));
        }
    }
}
