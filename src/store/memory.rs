// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory cache backend with lazy expiry and optional size limits

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::CacheBackend;
use crate::errors::StoreError;
use crate::types::cache::{TimestampMillis, Ttl, WriteSequence};

/// Entry in the memory cache with metadata
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The encoded payload
    payload: String,
    /// When this entry stops being valid
    expires_at: TimestampMillis,
    /// Write order, for deterministic eviction when expiries are equal
    write_seq: WriteSequence,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_past()
    }
}

/// In-memory cache backend
///
/// Entries live in a `DashMap`, so operations on different keys proceed in
/// parallel and operations on one key are atomic. It supports:
/// - Lazy expiry: a read checks the entry's expiry before returning it
/// - Optional active sweeping via [`spawn_sweeper`](Self::spawn_sweeper)
/// - Optional size limit, evicting the entry closest to expiry
///
/// # Examples
///
/// ```rust
/// use geocache::MemoryBackend;
///
/// // Unbounded
/// let backend = MemoryBackend::new();
///
/// // At most 10 000 entries
/// let backend = MemoryBackend::new().with_max_entries(10_000);
/// ```
///
/// # Performance
///
/// - Get / set / delete: O(1) average case
/// - Set beyond `max_entries`: O(n) to find the eviction candidate
/// - Prefix invalidation: O(n) over all keys
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, CacheEntry>,
    max_entries: Option<usize>,
    next_seq: AtomicU64,
}

impl MemoryBackend {
    /// Creates a new memory backend with no limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries
    ///
    /// When a write takes the map past the limit, expired entries are purged
    /// first, then the entries closest to expiry are evicted.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// Starts a background task that purges expired entries every `interval`
    ///
    /// The task holds only a weak reference and exits once the backend is
    /// dropped. Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let backend = Arc::downgrade(self);
        let interval = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(backend) = backend.upgrade() else {
                    break;
                };
                let removed = backend.sweep();
                if removed > 0 {
                    debug!(removed, "Swept expired entries from memory cache");
                }
            }
        })
    }

    fn next_write_seq(&self) -> WriteSequence {
        WriteSequence::from_raw(self.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    fn sweep(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired();
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Evicts until the map is within its limit, never evicting `keep`
    fn enforce_limit(&self, keep: &str) {
        let Some(max_entries) = self.max_entries else {
            return;
        };
        if self.entries.len() <= max_entries {
            return;
        }

        self.sweep();

        while self.entries.len() > max_entries {
            // Find the entry closest to expiry (by expiry, then by write order)
            let victim = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| (entry.expires_at, entry.write_seq))
                .map(|entry| entry.key().clone());

            match victim {
                Some(key) => {
                    debug!(key = %key, "Evicting cache entry closest to expiry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.payload.clone())),
            Some(_) => {}
        }

        // Re-checked under the write lock in case the key was just rewritten
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        debug!(key, "Cache entry expired");
        Ok(None)
    }

    async fn set(&self, key: &str, payload: String, ttl: Ttl) -> Result<(), StoreError> {
        let entry = CacheEntry {
            payload,
            expires_at: TimestampMillis::now().after(ttl.as_duration()),
            write_seq: self.next_write_seq(),
        };
        self.entries.insert(key.to_string(), entry);
        self.enforce_limit(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();

        let removed = matching
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| !entry.is_expired())
            .count();
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(self.sweep())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .count())
    }

    fn name(&self) -> &'static str {
        "MemoryBackend"
    }
}
