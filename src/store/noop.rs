// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! No-operation backend that disables caching entirely

use async_trait::async_trait;

use super::CacheBackend;
use crate::errors::StoreError;
use crate::types::cache::Ttl;

/// A no-operation backend that disables caching entirely
///
/// Every read misses and every write is accepted and dropped, so a
/// [`QueryCacheCoordinator`](crate::QueryCacheCoordinator) over it always
/// runs `compute`.
///
/// # Examples
///
/// ```rust
/// use geocache::{ExpiringStore, NoOpBackend, Ttl};
///
/// let store = ExpiringStore::new(NoOpBackend, Ttl::default());
/// assert_eq!(store.backend_name(), "NoOpBackend");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBackend;

#[async_trait]
impl CacheBackend for NoOpBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _payload: String, _ttl: Ttl) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "NoOpBackend"
    }
}
