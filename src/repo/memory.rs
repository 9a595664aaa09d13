use std::collections::HashMap;

use anyhow::Result;

use super::{Cache, CacheEntry};

#[derive(Debug, Clone)]
pub struct MemoryCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> MemoryCache<T> {
    pub fn with_entries(entries: HashMap<String, CacheEntry<T>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &HashMap<String, CacheEntry<T>> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone> Cache<T> for MemoryCache<T> {
    fn get_at(&self, key: &str, now: f64) -> Option<T> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now))
            .map(|entry| entry.value.clone())
    }

    fn put_at(&mut self, key: &str, value: T, now: f64) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                timestamp: now,
            },
        );
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
