//! In-process cache backend

use super::{CacheBackend, CacheEntry, CacheError};
use async_trait::async_trait;
use cached::{Cached, UnboundCache};
use tokio::sync::RwLock;

/// Backend holding entries in process memory
///
/// Entries are never expired here; the store ages them and the next put replaces them.
pub struct MemoryBackend {
    entries: RwLock<UnboundCache<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(UnboundCache::new()),
        }
    }

    /// Number of physically stored entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut entries = self.entries.write().await;
        Ok(entries.cache_get(key).cloned())
    }

    async fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let _ = entries.cache_set(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let _ = entries.cache_remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.cache_clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
