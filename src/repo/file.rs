use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::memory::MemoryCache;
use super::{Cache, CacheEntry};

/// Cache table mirrored to a JSON file.
pub struct FileCache<T> {
    table: MemoryCache<T>,
    path: PathBuf,
    persist_on_put: bool,
}

impl<T> FileCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Loads the table from `path`. A missing or unreadable file yields an empty table.
    pub fn open(path: impl Into<PathBuf>, persist_on_put: bool) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "cache loaded");
        Self {
            table: MemoryCache::with_entries(entries),
            path,
            persist_on_put,
        }
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string(self.table.entries()).context("failed to encode cache")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write cache {}", self.path.display()))?;
        Ok(())
    }
}

impl<T> Cache<T> for FileCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    fn get_at(&self, key: &str, now: f64) -> Option<T> {
        self.table.get_at(key, now)
    }

    fn put_at(&mut self, key: &str, value: T, now: f64) {
        self.table.put_at(key, value, now);
        if self.persist_on_put
            && let Err(err) = self.write()
        {
            warn!(error = %format!("{err:#}"), "failed to persist cache");
        }
    }

    fn clear(&mut self) {
        self.table.clear();
    }

    fn flush(&self) -> Result<()> {
        self.write()
    }
}

fn load_entries<T: DeserializeOwned>(path: &Path) -> HashMap<String, CacheEntry<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read cache file");
            return HashMap::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "failed to parse cache file");
        HashMap::new()
    })
}
