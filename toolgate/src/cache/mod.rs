//! Two-tier search-result cache.
//!
//! A fast volatile tier ([`MemoryCache`]) sits in front of a durable
//! file-based tier ([`FileCache`]); [`TieredCache`] composes them so tier
//! failures degrade to recomputation, never to request failure. Entries found
//! past their TTL are treated as absent and evicted by the reader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Bump when the on-disk entry layout changes; older files are ignored.
const FILE_ENTRY_VERSION: u32 = 1;

/// A live cache entry together with its remaining lifetime.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub payload: Value,
    pub expires_in: Duration,
}

/// One cache tier: TTL-scoped key/value storage for serialized results.
pub trait CacheTier: Send + Sync {
    /// Tier name for logs.
    fn name(&self) -> &'static str;
    /// Fetch a live entry; expired entries count as absent and are evicted.
    fn get(&self, key: &str) -> Result<Option<CacheHit>>;
    /// Store an entry for `ttl`.
    fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;
    /// Number of entries currently held, expired or not.
    fn entries(&self) -> usize;
}

/// Volatile in-process tier.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Instant, Value)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheTier for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<CacheHit>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((expires, payload)) => {
                let now = Instant::now();
                if now >= *expires {
                    entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(CacheHit {
                        payload: payload.clone(),
                        expires_in: *expires - now,
                    }))
                }
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        self.lock()
            .insert(key.to_string(), (Instant::now() + ttl, value.clone()));
        Ok(())
    }

    fn entries(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    version: u32,
    /// Unix seconds; absolute so entries survive restarts.
    expires_at: i64,
    payload: Value,
}

/// Durable file-based tier: one JSON file per key under a cache directory.
#[derive(Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl CacheTier for FileCache {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<CacheHit>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let entry: FileEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Unreadable cache entry, removing");
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };
        if entry.version != FILE_ENTRY_VERSION {
            tracing::warn!(
                path = %path.display(),
                entry_version = entry.version,
                expected_version = FILE_ENTRY_VERSION,
                "Cache entry version mismatch, removing"
            );
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }
        let now = chrono::Utc::now().timestamp();
        if now >= entry.expires_at {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(CacheHit {
            payload: entry.payload,
            expires_in: Duration::from_secs((entry.expires_at - now) as u64),
        }))
    }

    fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let entry = FileEntry {
            version: FILE_ENTRY_VERSION,
            expires_at: chrono::Utc::now().timestamp() + ttl.as_secs() as i64,
            payload: value.clone(),
        };
        std::fs::write(self.entry_path(key), serde_json::to_string(&entry)?)?;
        Ok(())
    }

    fn entries(&self) -> usize {
        match std::fs::read_dir(&self.dir) {
            Ok(dir) => dir
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .count(),
            Err(_) => 0,
        }
    }
}

/// Fast tier in front of a durable tier.
///
/// Lookups try the fast tier first; a durable hit is promoted into the fast
/// tier with its remaining lifetime so no entry outlives its original TTL.
/// All tier failures are logged and swallowed.
pub struct TieredCache {
    fast: MemoryCache,
    durable: FileCache,
    ttl: Duration,
}

impl TieredCache {
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self {
            fast: MemoryCache::new(),
            durable: FileCache::new(cache_dir),
            ttl,
        }
    }

    /// Configured TTL for new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self.fast.get(key) {
            Ok(Some(hit)) => return Some(hit.payload),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(tier = self.fast.name(), error = %err, "Cache read failed");
            }
        }
        match self.durable.get(key) {
            Ok(Some(hit)) => {
                if let Err(err) = self.fast.put(key, &hit.payload, hit.expires_in) {
                    tracing::warn!(tier = self.fast.name(), error = %err, "Cache promotion failed");
                }
                Some(hit.payload)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(tier = self.durable.name(), error = %err, "Cache read failed");
                None
            }
        }
    }

    pub fn put(&self, key: &str, value: &Value) {
        for tier in [&self.fast as &dyn CacheTier, &self.durable as &dyn CacheTier] {
            if let Err(err) = tier.put(key, value, self.ttl) {
                tracing::warn!(tier = tier.name(), error = %err, "Cache write failed");
            }
        }
    }

    /// (fast, durable) entry counts for health reporting.
    pub fn entry_counts(&self) -> (usize, usize) {
        (self.fast.entries(), self.durable.entries())
    }
}
