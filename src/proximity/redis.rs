// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Proximity index backed by a Redis GEO sorted set

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, error, Instrument};
use url::Url;

use super::{check_radius, finish_results, ProximityIndex};
use crate::errors::ProximityError;
use crate::store::LazyConnection;
use crate::tracing::spans;
use crate::types::geo::{GeoPoint, ProximityResult, RadiusQuery};

/// Proximity index stored in a Redis GEO set
///
/// Points are members of one sorted set (`geo:points` by default) written with
/// `GEOADD`; radius queries use `GEOSEARCH ... BYRADIUS ... ASC WITHDIST`, which
/// requires Redis 6.2 or later. Redis itself rejects latitudes beyond
/// ±85.05112878°; such inserts are logged and reported as `Ok(false)`.
///
/// The connection is opened lazily; while the server is unreachable inserts
/// report `Ok(false)` and queries return nothing.
#[derive(Clone)]
pub struct RedisGeoIndex {
    connection: LazyConnection,
    key: String,
}

impl std::fmt::Debug for RedisGeoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisGeoIndex")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl RedisGeoIndex {
    /// Creates an index over the sorted set `key` and tries to connect once
    ///
    /// A server that cannot be reached is logged at `error` level; the index is
    /// still returned and reconnects on later operations.
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::BackendUnavailable`] if the URL is rejected.
    pub async fn connect(url: &Url, key: impl Into<String>) -> Result<Self, ProximityError> {
        let connection = LazyConnection::open(url)?;
        connection.warm_up(url, "RedisGeoIndex").await;
        Ok(Self {
            connection,
            key: key.into(),
        })
    }

    fn failure(&self, operation: &'static str, err: &redis::RedisError) {
        error!(
            operation,
            key = %self.key,
            error = %err,
            "Proximity backend failure, degrading to empty result"
        );
    }

    async fn search(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<ProximityResult>, redis::RedisError> {
        let mut conn = self.connection.get().await?;

        let mut cmd = redis::cmd("GEOSEARCH");
        cmd.arg(&self.key)
            .arg("FROMLONLAT")
            .arg(query.longitude)
            .arg(query.latitude)
            .arg("BYRADIUS")
            .arg(query.radius)
            .arg(query.unit.as_str())
            .arg("ASC");
        if let Some(max_results) = query.max_results {
            cmd.arg("COUNT").arg(max_results);
        }
        cmd.arg("WITHDIST");

        let rows: Vec<(String, f64)> = cmd.query_async(&mut conn).await?;
        Ok(rows
            .into_iter()
            .map(|(id, distance)| ProximityResult { id, distance })
            .collect())
    }

    async fn add(&self, point: &GeoPoint) -> Result<usize, redis::RedisError> {
        let mut conn = self.connection.get().await?;
        redis::cmd("GEOADD")
            .arg(&self.key)
            .arg(point.longitude)
            .arg(point.latitude)
            .arg(&point.id)
            .query_async(&mut conn)
            .await
    }

    async fn discard(&self, id: &str) -> Result<usize, redis::RedisError> {
        let mut conn = self.connection.get().await?;
        conn.zrem(&self.key, id).await
    }

    async fn members(&self) -> Result<usize, redis::RedisError> {
        let mut conn = self.connection.get().await?;
        conn.zcard(&self.key).await
    }

    async fn ping(&self) -> Result<String, redis::RedisError> {
        let mut conn = self.connection.get().await?;
        redis::cmd("PING").query_async(&mut conn).await
    }
}

#[async_trait]
impl ProximityIndex for RedisGeoIndex {
    async fn insert(&self, point: GeoPoint) -> Result<bool, ProximityError> {
        match self.add(&point).await {
            Ok(_) => {
                debug!(id = %point.id, "Indexed point in Redis");
                Ok(true)
            }
            Err(e) => {
                self.failure("insert", &e);
                Ok(false)
            }
        }
    }

    async fn radius_query(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<ProximityResult>, ProximityError> {
        check_radius(query)?;
        if query.max_results == Some(0) {
            return Ok(Vec::new());
        }

        let span = spans::radius_query(query, self.name());
        async {
            match self.search(query).await {
                Ok(results) => {
                    let results = finish_results(results, query.max_results);
                    debug!(found = results.len(), "Radius query complete");
                    Ok(results)
                }
                Err(e) => {
                    self.failure("radius_query", &e);
                    Ok(Vec::new())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn remove(&self, id: &str) -> bool {
        match self.discard(id).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                self.failure("remove", &e);
                false
            }
        }
    }

    async fn len(&self) -> usize {
        match self.members().await {
            Ok(len) => len,
            Err(e) => {
                self.failure("len", &e);
                0
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self.ping().await {
            Ok(_) => true,
            Err(e) => {
                self.failure("ping", &e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "RedisGeoIndex"
    }
}
