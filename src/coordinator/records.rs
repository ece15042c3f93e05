// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Records addressed by location id rather than by query
//!
//! Boundaries live under `<prefix>:boundary:<id>` and demographics under
//! `<prefix>:demographics:<id>[:<category>]`, so other services sharing the
//! Redis instance can read and purge them without deriving a digest.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::QueryCacheCoordinator;
use crate::config::constants::namespaces;
use crate::errors::GeoCacheError;

impl QueryCacheCoordinator {
    /// Caches the boundary GeoJSON of a location with the `boundary` TTL
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for an empty id or one containing `:`,
    /// and [`GeoCacheError::Store`] if `geojson` cannot be serialized.
    pub async fn store_boundary<T>(
        &self,
        location_id: &str,
        geojson: &T,
    ) -> Result<bool, GeoCacheError>
    where
        T: Serialize + ?Sized,
    {
        let key = self.keys().record_key(namespaces::BOUNDARY, &[location_id])?;
        let ttl = self.ttl_for(namespaces::BOUNDARY);
        Ok(self.store().set_with_ttl(&key, geojson, ttl).await?)
    }

    /// Returns the cached boundary of a location
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for an empty id or one containing `:`.
    pub async fn boundary<T: DeserializeOwned>(
        &self,
        location_id: &str,
    ) -> Result<Option<T>, GeoCacheError> {
        let key = self.keys().record_key(namespaces::BOUNDARY, &[location_id])?;
        Ok(self.store().get(&key).await)
    }

    /// Caches demographic data of a location, optionally for one category
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for an empty id or category, or one
    /// containing `:`, and [`GeoCacheError::Store`] if `data` cannot be
    /// serialized.
    pub async fn store_demographics<T>(
        &self,
        location_id: &str,
        category: Option<&str>,
        data: &T,
    ) -> Result<bool, GeoCacheError>
    where
        T: Serialize + ?Sized,
    {
        let key = self.demographics_key(location_id, category)?;
        let ttl = self.ttl_for(namespaces::DEMOGRAPHICS);
        Ok(self.store().set_with_ttl(&key, data, ttl).await?)
    }

    /// Returns cached demographic data of a location
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for an empty id or category, or one
    /// containing `:`.
    pub async fn demographics<T: DeserializeOwned>(
        &self,
        location_id: &str,
        category: Option<&str>,
    ) -> Result<Option<T>, GeoCacheError> {
        let key = self.demographics_key(location_id, category)?;
        Ok(self.store().get(&key).await)
    }

    /// Drops the boundary and every demographics record of a location;
    /// returns how many entries were removed
    ///
    /// # Errors
    ///
    /// Returns [`GeoCacheError::Key`] for an empty id or one containing `:`.
    pub async fn invalidate_location(&self, location_id: &str) -> Result<usize, GeoCacheError> {
        let boundary = self.keys().record_key(namespaces::BOUNDARY, &[location_id])?;
        let demographics = self.demographics_key(location_id, None)?;

        let mut removed = usize::from(self.store().delete(&boundary).await);
        removed += usize::from(self.store().delete(&demographics).await);
        // Trailing ':' keeps location 29 from matching 295
        removed += self
            .store()
            .invalidate_prefix(&format!("{demographics}:"))
            .await;
        Ok(removed)
    }

    fn demographics_key(
        &self,
        location_id: &str,
        category: Option<&str>,
    ) -> Result<String, GeoCacheError> {
        let key = match category {
            Some(category) => self
                .keys()
                .record_key(namespaces::DEMOGRAPHICS, &[location_id, category])?,
            None => self.keys().record_key(namespaces::DEMOGRAPHICS, &[location_id])?,
        };
        Ok(key)
    }
}
