use crate::Result;

use keel_core::async_trait;
use serde::{Deserialize, Serialize};

use indexmap::IndexMap;
use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// How query results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// How long a stored result stays fresh.
    pub duration: Duration,

    /// Cache every select unless the query opts out with `cache(false)`.
    pub always_enabled: bool,

    /// Log cache backend failures and carry on without the cache.
    pub ignore_errors: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            duration: Duration::from_millis(1000),
            always_enabled: false,
            ignore_errors: true,
        }
    }
}

/// A cached query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Explicit cache id given with the query, if any.
    pub identifier: Option<String>,

    /// `sql -- PARAMETERS: [..]`
    pub query: String,

    /// When the entry was stored, in milliseconds since the Unix epoch.
    pub time: u64,

    /// Freshness window in milliseconds.
    pub duration: u64,

    /// Raw rows serialized as JSON.
    pub result: String,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.time.saturating_add(self.duration) < now
    }
}

/// Storage for cached select results.
#[async_trait]
pub trait QueryResultCache: std::fmt::Debug + Send + Sync + 'static {
    /// Looks an entry up by identifier when one is given, by query text
    /// otherwise.
    async fn get_from_cache(&self, identifier: Option<&str>, query: &str)
        -> Result<Option<CacheEntry>>;

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired_at(now_millis())
    }

    /// Stores an entry, replacing any entry with the same key.
    async fn store_in_cache(&self, entry: CacheEntry) -> Result<()>;

    /// Removes the entries stored under the given identifiers.
    async fn remove(&self, identifiers: &[String]) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Process-local [`QueryResultCache`].
#[derive(Debug, Default)]
pub struct MemoryQueryResultCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
}

impl MemoryQueryResultCache {
    pub fn new() -> MemoryQueryResultCache {
        MemoryQueryResultCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(identifier: Option<&str>, query: &str) -> String {
    match identifier {
        Some(identifier) => format!("id:{identifier}"),
        None => format!("query:{query}"),
    }
}

#[async_trait]
impl QueryResultCache for MemoryQueryResultCache {
    async fn get_from_cache(
        &self,
        identifier: Option<&str>,
        query: &str,
    ) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key(identifier, query)).cloned())
    }

    async fn store_in_cache(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key(entry.identifier.as_deref(), &entry.query), entry);
        Ok(())
    }

    async fn remove(&self, identifiers: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for identifier in identifiers {
            entries.shift_remove(&key(Some(identifier), ""));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
