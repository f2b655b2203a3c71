//! On-disk memoization of fetched resources
//!
//! Every fetched resource (listing page, descriptor, feed) is stored as a blob
//! named after the blake3 hash of its key. Entries never expire and are never
//! rewritten. A missing file means "not fetched yet"; a zero-length file means
//! "fetched, and the body was empty". Failed fetches are not stored at all.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::services::FetchError;

const BLOB_EXTENSION: &str = "blob";

#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache directory cannot be read or written. Fatal for the run.
    #[error("cache storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The resource could not be fetched; nothing was stored.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl CacheError {
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    fn storage(path: &Path, source: std::io::Error) -> Self {
        Self::Storage { path: path.to_path_buf(), source }
    }
}

/// What the cache knows about a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryState {
    Absent,
    Present { len: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub state: CacheEntryState,
}

/// Key-addressed blob cache with per-key fetch serialization.
pub struct ResourceCache {
    dir: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResourceCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::storage(&dir, e))?;
        debug!("Resource cache opened at {}", dir.display());

        Ok(Self {
            dir,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic blob path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.dir.join(format!("{}.{BLOB_EXTENSION}", digest.to_hex()))
    }

    /// Look at the slot for `key` without fetching anything.
    pub async fn probe(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let path = self.path_for(key);
        let state = match fs::metadata(&path).await {
            Ok(metadata) => CacheEntryState::Present { len: metadata.len() },
            Err(e) if e.kind() == ErrorKind::NotFound => CacheEntryState::Absent,
            Err(e) => return Err(CacheError::storage(&path, e)),
        };

        Ok(CacheEntry {
            key: key.to_string(),
            path,
            state,
        })
    }

    /// Persisted bytes for `key`, if any.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::storage(&path, e)),
        }
    }

    /// Return the cached bytes for `key`, calling `fetch` only on a miss.
    ///
    /// Concurrent callers for the same key are serialized, so `fetch` runs at
    /// most once per key and process unless it fails. A failed fetch leaves the
    /// slot absent and is returned as [`CacheError::Fetch`].
    pub async fn fetch_cached<F, Fut>(&self, key: &str, fetch: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        if let Some(bytes) = self.read(key).await? {
            trace!("Cache hit: {}", key);
            return Ok(bytes);
        }

        let key_lock = self.lock_for(key).await;
        let result = {
            let _guard = key_lock.lock().await;
            self.fetch_locked(key, fetch).await
        };
        drop(key_lock);
        self.release_lock(key).await;
        result
    }

    async fn fetch_locked<F, Fut>(&self, key: &str, fetch: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        // Another caller may have filled the slot while we waited.
        if let Some(bytes) = self.read(key).await? {
            trace!("Cache hit after wait: {}", key);
            return Ok(bytes);
        }

        debug!("Cache miss, fetching: {}", key);
        let bytes = fetch(key.to_string()).await?;
        self.persist(key, &bytes).await?;
        Ok(bytes)
    }

    /// Write to a private temp file, then rename into place.
    async fn persist(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let temp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));

        fs::write(&temp_path, bytes)
            .await
            .map_err(|e| CacheError::storage(&temp_path, e))?;

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::storage(&path, e));
        }

        debug!("Cached {} bytes for {} at {}", bytes.len(), key, path.display());
        Ok(())
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    async fn release_lock(&self, key: &str) {
        let mut locks = self.key_locks.lock().await;
        // Only the map's own handle left: nobody else waits on this key.
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }
}
