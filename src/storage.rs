use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config, domain::ActivitySnapshot};

const SNAPSHOT_FILE: &str = "snapshot.json";

/// Six hours, in milliseconds.
pub const SNAPSHOT_TTL_MS: i64 = 6 * 60 * 60 * 1000;

/// A snapshot together with its cache-write time (epoch milliseconds).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub snapshot: ActivitySnapshot,
    pub cached_at_ms: i64,
}

impl CachedSnapshot {
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.cached_at_ms) < ttl_ms
    }
}

/// Where the acquisition routine keeps its last successful result. It is the
/// only writer, so implementations need no cross-process coordination.
pub trait SnapshotCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError>;
    fn store(&self, entry: &CachedSnapshot) -> Result<(), CacheError>;
}

pub struct FileCache {
    snapshot_path: PathBuf,
}

impl FileCache {
    pub fn initialize() -> Result<Self, CacheError> {
        let dir = config::storage_dir().map_err(|_| CacheError::HomeDirMissing)?;
        Self::in_dir(dir)
    }

    pub fn in_dir(dir: PathBuf) -> Result<Self, CacheError> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            snapshot_path: dir.join(SNAPSHOT_FILE),
        })
    }
}

impl SnapshotCache for FileCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        match fs::read_to_string(&self.snapshot_path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, entry: &CachedSnapshot) -> Result<(), CacheError> {
        let data = serde_json::to_string_pretty(entry)?;
        fs::write(&self.snapshot_path, data)?;
        Ok(())
    }
}

/// Stand-in when no cache directory is available: always a miss.
pub struct NullCache;

impl SnapshotCache for NullCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(None)
    }

    fn store(&self, _entry: &CachedSnapshot) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryCache {
    entry: std::cell::RefCell<Option<CachedSnapshot>>,
    writes: std::cell::Cell<usize>,
}

#[cfg(test)]
impl MemoryCache {
    pub fn with_entry(entry: CachedSnapshot) -> Self {
        let cache = Self::default();
        cache.entry.replace(Some(entry));
        cache
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn current(&self) -> Option<CachedSnapshot> {
        self.entry.borrow().clone()
    }
}

#[cfg(test)]
impl SnapshotCache for MemoryCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.entry.borrow().clone())
    }

    fn store(&self, entry: &CachedSnapshot) -> Result<(), CacheError> {
        self.entry.replace(Some(entry.clone()));
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("HOME environment variable is not set; cannot cache under ~/.activity-dashboard")]
    HomeDirMissing,
    #[error("I/O error while handling the snapshot cache: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to (de)serialize the cached snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
