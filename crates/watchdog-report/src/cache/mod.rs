//! Caching layer for datasets to reduce provider calls
//!
//! [`CacheStore`] owns the process-wide backend handle. It is created once at
//! startup, connected with [`CacheStore::initialize`] (repeat calls are
//! no-ops) and torn down with [`CacheStore::shutdown`]. Entries are aged with
//! the store's [`Clock`]; a stale entry is never served.

mod clock;
mod memory;
mod redis_backend;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;

use crate::dataset::{Dataset, DatasetName, InvariantViolation, Jurisdiction};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Cache layer errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend could not be reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// `initialize` has not succeeded yet, or the store was shut down
    #[error("Cache store not initialized")]
    NotInitialized,

    /// Entry could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dataset refused because it could not be read back intact
    #[error("Refusing to cache invalid dataset: {0}")]
    InvalidDataset(#[from] InvariantViolation),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

/// Which backend the store connects to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// In-process map, lost on exit
    #[default]
    Memory,
    /// Shared Redis instance
    Redis { url: String },
}

/// Cache key for one dataset in one scope
///
/// Always includes the jurisdiction so province budgets never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: DatasetName,
    pub scope: Jurisdiction,
    rendered: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(prefix: &str, dataset: DatasetName, scope: Jurisdiction) -> Self {
        Self {
            dataset,
            scope,
            rendered: format!("{prefix}:{}:{}", dataset.as_str(), scope.slug()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Serialized dataset plus the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    /// Fresh iff `now - created_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::milliseconds(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX));
        now.signed_duration_since(self.created_at) < ttl
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Storage behind a [`CacheStore`]
///
/// Backends only move entries around; freshness is decided by the store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Replace whatever is stored under `key`
    async fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

enum Connector {
    Config(CacheBackendConfig),
    Backend(Arc<dyn CacheBackend>),
}

/// Thread-safe dataset cache with per-entry TTL
pub struct CacheStore {
    connector: Connector,
    key_prefix: String,
    clock: Arc<dyn Clock>,
    backend: RwLock<Option<Arc<dyn CacheBackend>>>,
}

impl CacheStore {
    /// Default prefix of every cache key
    pub const DEFAULT_KEY_PREFIX: &'static str = "watchdog";

    /// Store that connects the configured backend on `initialize`
    pub fn new(config: CacheBackendConfig) -> Self {
        Self::with_connector(Connector::Config(config))
    }

    /// Store that installs an already-built backend on `initialize`
    pub fn from_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_connector(Connector::Backend(backend))
    }

    fn with_connector(connector: Connector) -> Self {
        Self {
            connector,
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
            backend: RwLock::new(None),
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Cache key of a dataset in a scope
    pub fn key(&self, dataset: DatasetName, scope: Jurisdiction) -> CacheKey {
        CacheKey::new(&self.key_prefix, dataset, scope)
    }

    /// Connect the backend; a no-op when already connected
    pub async fn initialize(&self) -> Result<(), CacheError> {
        let mut slot = self.backend.write().await;
        if slot.is_some() {
            tracing::debug!("Cache store already initialized");
            return Ok(());
        }

        let backend: Arc<dyn CacheBackend> = match &self.connector {
            Connector::Backend(backend) => Arc::clone(backend),
            Connector::Config(CacheBackendConfig::Memory) => Arc::new(MemoryBackend::new()),
            Connector::Config(CacheBackendConfig::Redis { url }) => {
                Arc::new(RedisBackend::connect(url, &self.key_prefix).await?)
            }
        };

        tracing::info!("Cache store initialized with {} backend", backend.name());
        *slot = Some(backend);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// Drop the backend handle; the store can be initialized again later
    pub async fn shutdown(&self) {
        if let Some(backend) = self.backend.write().await.take() {
            tracing::info!("Cache store ({}) shut down", backend.name());
        }
    }

    async fn backend(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
        self.backend
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(CacheError::NotInitialized)
    }

    /// Get a fresh dataset; stale or undecodable entries count as absent
    ///
    /// Nothing is removed here: a concurrent `put` may already have replaced
    /// the entry that was loaded. Stale entries are overwritten by the next
    /// `put` (and expire on their own in Redis).
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Dataset>, CacheError> {
        let backend = self.backend().await?;
        let Some(entry) = backend.load(key.as_str()).await? else {
            return Ok(None);
        };

        if !entry.is_fresh(self.clock.now()) {
            tracing::debug!("Cache entry expired for key: {}", key);
            return Ok(None);
        }

        match serde_json::from_value::<Dataset>(entry.payload) {
            Ok(dataset) => Ok(Some(dataset)),
            Err(e) => {
                tracing::warn!("Ignoring undecodable cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Replace the entry for `key`, stamped with the current time
    ///
    /// A dataset that breaks its invariants is refused, so whatever is stored
    /// can be read back unchanged.
    pub async fn put(&self, key: &CacheKey, dataset: &Dataset, ttl: Duration) -> Result<(), CacheError> {
        dataset.validate()?;
        let backend = self.backend().await?;
        let entry = CacheEntry {
            payload: serde_json::to_value(dataset)?,
            created_at: self.clock.now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        backend.store(key.as_str(), entry).await
    }

    /// Invalidate a specific cache entry
    pub async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.backend().await?.remove(key.as_str()).await
    }

    /// Clear all cached entries
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.backend().await?.clear().await
    }

    /// Check the backend answers
    pub async fn ping(&self) -> Result<(), CacheError> {
        self.backend().await?.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{PeriodKind, Province};
    use tokio::sync::{Notify, oneshot};

    fn sample(name: DatasetName, scope: Jurisdiction) -> Dataset {
        Dataset::single(
            name,
            scope,
            PeriodKind::Year,
            vec!["2021".into(), "2022".into(), "2023".into()],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap()
    }

    async fn memory_store() -> (Arc<MemoryBackend>, Arc<ManualClock>, CacheStore) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::from_backend(backend.clone()).with_clock(clock.clone());
        store.initialize().await.unwrap();
        (backend, clock, store)
    }

    #[test]
    fn test_cache_key_includes_scope() {
        let federal = CacheKey::new("watchdog", DatasetName::Budget, Jurisdiction::Federal);
        let ontario = CacheKey::new(
            "watchdog",
            DatasetName::Budget,
            Jurisdiction::Province(Province::Ontario),
        );
        assert_eq!(federal.as_str(), "watchdog:budget:federal");
        assert_eq!(ontario.as_str(), "watchdog:budget:ontario");
        assert_ne!(federal, ontario);
    }

    #[test]
    fn test_entry_freshness_boundary() {
        let created_at = Utc::now();
        let entry = CacheEntry {
            payload: serde_json::Value::Null,
            created_at,
            ttl_ms: 1_000,
        };
        assert!(entry.is_fresh(created_at));
        assert!(entry.is_fresh(created_at + TimeDelta::milliseconds(999)));
        assert!(!entry.is_fresh(created_at + TimeDelta::milliseconds(1_000)));
    }

    #[tokio::test]
    async fn test_put_then_get_returns_value() {
        let (_, _, store) = memory_store().await;
        let dataset = sample(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);

        store.put(&key, &dataset, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(dataset));
    }

    #[tokio::test]
    async fn test_stale_entry_is_absent_but_still_stored() {
        let (backend, clock, store) = memory_store().await;
        let dataset = sample(DatasetName::InflationRate, Jurisdiction::Federal);
        let key = store.key(DatasetName::InflationRate, Jurisdiction::Federal);

        store.put(&key, &dataset, Duration::from_secs(60)).await.unwrap();
        clock.advance(Duration::from_secs(61));

        assert_eq!(store.get(&key).await.unwrap(), None);
        // Reads never delete; the next put replaces it
        assert!(backend.load(key.as_str()).await.unwrap().is_some());
    }

    /// Memory backend that parks the first armed load until released
    struct GatedBackend {
        inner: MemoryBackend,
        loaded: Notify,
        release: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl CacheBackend for GatedBackend {
        fn name(&self) -> &'static str {
            "gated"
        }
        async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
            let entry = self.inner.load(key).await?;
            let gate = self.release.lock().await.take();
            if let Some(release) = gate {
                self.loaded.notify_one();
                let _ = release.await;
            }
            Ok(entry)
        }
        async fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
            self.inner.store(key, entry).await
        }
        async fn remove(&self, key: &str) -> Result<(), CacheError> {
            self.inner.remove(key).await
        }
        async fn clear(&self) -> Result<(), CacheError> {
            self.inner.clear().await
        }
        async fn ping(&self) -> Result<(), CacheError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn test_stale_read_racing_a_put_keeps_the_fresh_entry() {
        let backend = Arc::new(GatedBackend {
            inner: MemoryBackend::new(),
            loaded: Notify::new(),
            release: tokio::sync::Mutex::new(None),
        });
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::from_backend(backend.clone()).with_clock(clock.clone()));
        store.initialize().await.unwrap();

        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let old = sample(DatasetName::GdpGrowth, Jurisdiction::Federal);
        store.put(&key, &old, Duration::from_secs(60)).await.unwrap();
        clock.advance(Duration::from_secs(61));

        let (release, gate) = oneshot::channel();
        *backend.release.lock().await = Some(gate);

        // Reader loads the stale entry and is parked there
        let reader = {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move { store.get(&key).await })
        };
        backend.loaded.notified().await;

        let mut fresh = old.clone();
        fresh.series.insert("gdp_growth".into(), vec![7.0, 8.0, 9.0]);
        store.put(&key, &fresh, Duration::from_secs(60)).await.unwrap();
        release.send(()).unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), None);
        assert_eq!(store.get(&key).await.unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_put_refuses_non_finite_values() {
        let (backend, _, store) = memory_store().await;
        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let mut dataset = sample(DatasetName::GdpGrowth, Jurisdiction::Federal);
        dataset.series.insert("gdp_growth".into(), vec![1.0, f64::NAN, 3.0]);

        let result = store.put(&key, &dataset, Duration::from_secs(60)).await;

        assert!(matches!(result, Err(CacheError::InvalidDataset(_))));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_restamps() {
        let (_, clock, store) = memory_store().await;
        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let first = sample(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let mut second = first.clone();
        second.series.insert("gdp_growth".into(), vec![4.0, 5.0, 6.0]);

        store.put(&key, &first, Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(8));
        store.put(&key, &second, Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(8));

        assert_eq!(store.get(&key).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_province_entries_do_not_collide() {
        let (_, _, store) = memory_store().await;
        let on = Jurisdiction::Province(Province::Ontario);
        let ab = Jurisdiction::Province(Province::Alberta);
        let on_key = store.key(DatasetName::Budget, on);

        store
            .put(&on_key, &sample(DatasetName::Budget, on), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.get(&store.key(DatasetName::Budget, ab)).await.unwrap().is_none());
        assert!(store.get(&on_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (_, _, store) = memory_store().await;
        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let dataset = sample(DatasetName::GdpGrowth, Jurisdiction::Federal);
        store.put(&key, &dataset, Duration::from_secs(60)).await.unwrap();

        store.initialize().await.unwrap();

        // Same backend, so the entry survives the second call
        assert_eq!(store.get(&key).await.unwrap(), Some(dataset));
    }

    #[tokio::test]
    async fn test_uninitialized_and_shut_down_store() {
        let store = CacheStore::new(CacheBackendConfig::Memory);
        let key = store.key(DatasetName::Budget, Jurisdiction::Federal);
        assert!(matches!(store.get(&key).await, Err(CacheError::NotInitialized)));

        store.initialize().await.unwrap();
        assert!(store.is_initialized().await);
        assert!(store.ping().await.is_ok());

        store.shutdown().await;
        store.shutdown().await;
        assert!(!store.is_initialized().await);
        assert!(matches!(store.get(&key).await, Err(CacheError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let (_, _, store) = memory_store().await;
        let gdp = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        let cpi = store.key(DatasetName::InflationRate, Jurisdiction::Federal);
        for key in [&gdp, &cpi] {
            store
                .put(key, &sample(key.dataset, key.scope), Duration::from_secs(60))
                .await
                .unwrap();
        }

        store.remove(&gdp).await.unwrap();
        assert!(store.get(&gdp).await.unwrap().is_none());
        assert!(store.get(&cpi).await.unwrap().is_some());

        store.clear().await.unwrap();
        assert!(store.get(&cpi).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let (backend, clock, store) = memory_store().await;
        let key = store.key(DatasetName::Budget, Jurisdiction::Federal);
        backend
            .store(
                key.as_str(),
                CacheEntry {
                    payload: serde_json::json!({"unexpected": true}),
                    created_at: clock.now(),
                    ttl_ms: 60_000,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_initialize() {
        let store = CacheStore::new(CacheBackendConfig::Redis {
            url: "redis://127.0.0.1:1/0".to_string(),
        });
        assert!(matches!(store.initialize().await, Err(CacheError::Unavailable(_))));
        assert!(!store.is_initialized().await);
    }
}
