use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fetchgate_core::{CacheBackend, ExecutorError};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    stored_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// Persistent cache: one JSON file per key under a directory.
///
/// File names are the blake3 hash of the key. Entries older than the TTL,
/// unreadable files and hash collisions all read as misses.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create cache directory {}", dir.display()))?;
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = blake3::hash(key.as_bytes()).to_hex();
        self.dir.join(format!("{name}.json"))
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = (Utc::now() - stored_at).to_std().unwrap_or_default();
        age >= ttl
    }

    fn read(&self, path: &Path) -> Result<Option<StoredEntry>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let entry = serde_json::from_slice(&raw)
            .with_context(|| format!("decode {}", path.display()))?;
        Ok(Some(entry))
    }

    fn write(&self, path: &Path, entry: &StoredEntry) -> Result<()> {
        let raw = serde_json::to_vec(entry)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl CacheBackend for FileCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let entry = match self.read(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "dropping unreadable cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        if entry.key != key {
            return None;
        }
        if self.is_expired(entry.stored_at) {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(entry.value)
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), ExecutorError> {
        let entry = StoredEntry {
            key: key.to_string(),
            stored_at: Utc::now(),
            value,
        };
        self.write(&self.path_for(key), &entry)
            .map_err(|err| ExecutorError::Cache(format!("{err:#}")))
    }
}
