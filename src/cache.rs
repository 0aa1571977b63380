use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Keyed store with per-entry expiry.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Duration);
}

/// Cache key of a book detail page.
#[must_use]
pub fn book_key(id: i64) -> String {
    format!("book_{id}")
}

/// Process-local [`CacheStore`]. Expired entries are dropped when read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Value, Instant)>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        let (value, expires_at) = entry.value();
        if Instant::now() < *expires_at {
            return Some(value.clone());
        }
        // the read guard must be released before removing
        drop(entry);
        self.entries
            .remove_if(key, |_, (_, expires_at)| Instant::now() >= *expires_at);
        None
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }
}
