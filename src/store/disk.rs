// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Disk-based cache backend with file locking and versioning

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::CacheBackend;
use crate::errors::StoreError;
use crate::types::cache::{TimestampMillis, Ttl};

/// Current cache file format version
const CACHE_VERSION: u32 = 1;

/// Entry in the disk cache with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// The encoded payload
    payload: String,
    /// When this entry stops being valid
    expires_at: TimestampMillis,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_past()
    }
}

/// Serialized cache format (versioned)
#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    /// Cache format version
    version: u32,
    /// Cached entries by key
    entries: HashMap<String, CacheEntry>,
}

impl Default for CacheData {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }
}

impl CacheData {
    fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }
}

/// Disk-based cache backend with file locking, versioning and TTL support
///
/// All entries are kept in one JSON file with:
/// - Advisory file locking for multi-process safety
/// - A format version; a file written by another version reads as empty
/// - Atomic replacement through a temp file and rename
///
/// Every operation reads the whole file, so this backend suits small caches
/// shared between short-lived processes rather than hot request paths.
///
/// # Examples
///
/// ```rust,ignore
/// use geocache::{DiskBackend, ExpiringStore, Ttl};
///
/// let backend = DiskBackend::new("/var/cache/geocache.json").validate()?;
/// let store = ExpiringStore::new(backend, Ttl::default());
/// ```
#[derive(Debug)]
pub struct DiskBackend {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl DiskBackend {
    /// Creates a new disk backend at the specified path
    ///
    /// Path validation is NOT performed until the first I/O operation. Use
    /// [`validate()`](Self::validate) to check the path immediately.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates the cache path and creates the parent directory if needed
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CacheIo`] if the path has no parent, or the
    /// parent directory cannot be created or is not writable.
    pub fn validate(self) -> Result<Self, StoreError> {
        let parent = self.path.parent().ok_or_else(|| {
            StoreError::cache_io(
                self.path.display().to_string(),
                "Cache path has no parent directory",
                None,
            )
        })?;

        // `Path::parent` of a bare file name is the empty path
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::cache_io(
                    parent.display().to_string(),
                    format!("Failed to create cache directory: {e}"),
                    Some(e),
                )
            })?;
            debug!(path = %parent.display(), "Created cache directory");
        }

        // Validate parent is writable by attempting to create a temp file
        let test_file = parent.join(".geocache_write_test");
        std::fs::write(&test_file, b"test").map_err(|e| {
            StoreError::cache_io(
                parent.display().to_string(),
                format!("Cache directory is not writable: {e}"),
                Some(e),
            )
        })?;
        let _ = std::fs::remove_file(&test_file);

        debug!(path = %self.path.display(), "Cache path validated successfully");
        Ok(self)
    }

    /// Loads cache data from disk with a shared file lock
    async fn load(&self) -> Result<CacheData, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Cache file does not exist, using empty cache");
            return Ok(CacheData::default());
        }

        let file = File::open(&self.path)
            .map_err(|e| io_error(&self.path, "Failed to open cache file", e))?;

        file.lock_shared()
            .map_err(|e| io_error(&self.path, "Failed to acquire read lock", e))?;

        let data: CacheData = serde_json::from_reader(&file).map_err(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to parse cache file"
            );
            StoreError::serialization(e)
        })?;

        // Unlock by dropping the file
        drop(file);

        if data.version != CACHE_VERSION {
            warn!(
                path = %self.path.display(),
                cached_version = data.version,
                current_version = CACHE_VERSION,
                "Cache version mismatch, ignoring cached data"
            );
            return Ok(CacheData::default());
        }

        Ok(data)
    }

    /// Saves cache data to disk with an exclusive lock and atomic rename
    async fn save(&self, data: &CacheData) -> Result<(), StoreError> {
        let json = serde_json::to_vec(data).map_err(StoreError::serialization)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, "Failed to create cache directory", e))?;
            }
        }

        let temp_path = self.path.with_extension("tmp");

        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| io_error(&temp_path, "Failed to write cache", e))?;

        let file = File::open(&temp_path)
            .map_err(|e| io_error(&temp_path, "Failed to open temp cache file", e))?;

        file.lock()
            .map_err(|e| io_error(&temp_path, "Failed to acquire write lock", e))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| io_error(&self.path, "Failed to replace cache file", e))?;

        // Unlock by dropping the file
        drop(file);

        debug!(
            path = %self.path.display(),
            entries = data.entries.len(),
            "Saved geocache file"
        );

        Ok(())
    }
}

fn io_error(path: &Path, details: &str, e: std::io::Error) -> StoreError {
    StoreError::cache_io(
        path.display().to_string(),
        format!("{details}: {e}"),
        Some(e),
    )
}

#[async_trait]
impl CacheBackend for DiskBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.load().await?;

        Ok(data
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.payload.clone()))
    }

    async fn set(&self, key: &str, payload: String, ttl: Ttl) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // A corrupt or foreign file is replaced rather than blocking writes
        let mut data = self.load().await.unwrap_or_default();
        data.purge_expired();

        data.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                expires_at: TimestampMillis::now().after(ttl.as_duration()),
            },
        );

        self.save(&data).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;

        match data.entries.remove(key) {
            Some(entry) => {
                self.save(&data).await?;
                Ok(!entry.is_expired())
            }
            None => Ok(false),
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;

        let before = data.entries.len();
        let mut removed = 0;
        data.entries.retain(|key, entry| {
            let matches = key.starts_with(prefix);
            if matches && !entry.is_expired() {
                removed += 1;
            }
            !matches
        });

        if data.entries.len() != before {
            self.save(&data).await?;
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;

        let removed = data.purge_expired();
        if removed > 0 {
            self.save(&data).await?;
            info!(path = %self.path.display(), removed, "Purged expired entries from cache file");
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await.map(|_| ())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.load().await?;
        Ok(data
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .count())
    }

    fn name(&self) -> &'static str {
        "DiskBackend"
    }
}
