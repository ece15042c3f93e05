// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Redis cache backend

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};
use url::Url;

use super::CacheBackend;
use crate::errors::StoreError;
use crate::types::cache::Ttl;

/// Keys fetched per `SCAN` round trip during prefix invalidation
const SCAN_BATCH: usize = 500;

/// Retries after a failed connection attempt, per operation
const CONNECT_RETRIES: usize = 1;

/// Upper bound on a single connection attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis connection opened on first use
///
/// A failed attempt leaves the slot empty, so the next operation tries again
/// and a server that comes back later is picked up without a restart. Once
/// open, the [`ConnectionManager`] reconnects on its own.
#[derive(Clone)]
pub(crate) struct LazyConnection {
    client: redis::Client,
    connection: Arc<OnceCell<ConnectionManager>>,
}

impl LazyConnection {
    /// Parses `url`; no connection is made yet
    pub(crate) fn open(url: &Url) -> RedisResult<Self> {
        Ok(Self {
            client: redis::Client::open(url.as_str())?,
            connection: Arc::new(OnceCell::new()),
        })
    }

    /// Returns the shared connection, opening it if needed
    pub(crate) async fn get(&self) -> RedisResult<ConnectionManager> {
        self.connection
            .get_or_try_init(|| {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(CONNECT_RETRIES)
                    .set_connection_timeout(CONNECT_TIMEOUT);
                ConnectionManager::new_with_config(self.client.clone(), config)
            })
            .await
            .cloned()
    }

    /// Opens the connection now, logging instead of failing when the server is down
    pub(crate) async fn warm_up(&self, url: &Url, component: &'static str) {
        let host = url.host_str().unwrap_or_default();
        match self.get().await {
            Ok(_) => info!(host, component, "Connected to Redis"),
            Err(e) => error!(
                host,
                component,
                error = %e,
                "Redis unreachable at startup, operations degrade until it recovers"
            ),
        }
    }
}

/// Redis-backed cache
///
/// Entries are plain string keys written with `SET key payload EX ttl`, so
/// expiry is enforced by the server. Prefix invalidation walks the keyspace
/// with `SCAN MATCH <prefix>*` and deletes the matches; glob metacharacters in
/// the prefix are escaped.
///
/// The connection is opened lazily, so an unreachable server only costs
/// misses and never fails construction.
#[derive(Clone)]
pub struct RedisBackend {
    connection: LazyConnection,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Creates a backend for the server at `url` and tries to connect once
    ///
    /// A server that cannot be reached is logged at `error` level; the backend
    /// is still returned and reconnects on later operations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackendUnavailable`] if the URL is rejected.
    pub async fn connect(url: &Url) -> Result<Self, StoreError> {
        let connection = LazyConnection::open(url)?;
        connection.warm_up(url, "RedisBackend").await;
        Ok(Self { connection })
    }
}

/// Escapes Redis glob metacharacters so `prefix` matches literally
pub(crate) fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 8);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.get().await?;
        let payload: Option<String> = conn.get(key).await?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: String, ttl: Ttl) -> Result<(), StoreError> {
        let mut conn = self.connection.get().await?;
        let _: () = conn.set_ex(key, payload, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.get().await?;
        let removed: usize = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.get().await?;
        let pattern = format!("{}*", escape_glob(prefix));

        let mut cursor: u64 = 0;
        let mut removed = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: usize = conn.del(&keys).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix, removed, "Deleted Redis keys by prefix");
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        // Expiry is enforced by the server
        Ok(0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let mut conn = self.connection.get().await?;
        let size: usize = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }

    fn name(&self) -> &'static str {
        "RedisBackend"
    }
}
