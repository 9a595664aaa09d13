use anyhow::Result;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub mod config;
pub mod file;
pub mod github;
pub mod memory;

/// Entries older than this many seconds are never served.
pub const CACHE_TTL_SECS: f64 = 900.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    #[serde(flatten)]
    pub value: T,
    pub timestamp: f64,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh_at(&self, now: f64) -> bool {
        now - self.timestamp < CACHE_TTL_SECS
    }
}

/// Time-bounded key-value table keyed by request url.
pub trait Cache<T> {
    fn get_at(&self, key: &str, now: f64) -> Option<T>;
    fn put_at(&mut self, key: &str, value: T, now: f64);
    /// Drops every entry in memory. Whatever is on disk stays until the next write.
    fn clear(&mut self);
    fn flush(&self) -> Result<()>;

    fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, now_unix())
    }

    fn put(&mut self, key: &str, value: T) {
        self.put_at(key, value, now_unix())
    }
}

pub fn now_unix() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}
