//! Cache-aside wrapper around a [`SourceFetcher`]

use crate::cache::CacheStore;
use crate::config::WatchdogConfig;
use crate::dataset::{Dataset, DatasetClass, DatasetName, Jurisdiction};
use crate::error::{ReportError, Result};
use crate::source::SourceFetcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serves datasets from the cache when fresh, from the source otherwise
///
/// Only a successful fetch writes to the cache. Cache failures degrade to
/// always-fetch and are never reported to the caller; source failures are
/// returned unchanged.
pub struct CachedFetcher {
    source: Arc<dyn SourceFetcher>,
    store: Arc<CacheStore>,
    ttl_budget: Duration,
    ttl_indicator: Duration,
    request_timeout: Duration,
}

impl CachedFetcher {
    pub fn new(source: Arc<dyn SourceFetcher>, store: Arc<CacheStore>, config: &WatchdogConfig) -> Self {
        Self {
            source,
            store,
            ttl_budget: config.ttl_budget,
            ttl_indicator: config.ttl_indicator,
            request_timeout: config.request_timeout,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn ttl(&self, name: DatasetName) -> Duration {
        match name.class() {
            DatasetClass::Budget => self.ttl_budget,
            DatasetClass::Indicator => self.ttl_indicator,
        }
    }

    /// Budget dataset of one jurisdiction
    pub async fn get_budget(&self, jurisdiction: Jurisdiction) -> Result<Dataset> {
        self.get_or_fetch(DatasetName::Budget, jurisdiction).await
    }

    /// National series of one indicator
    pub async fn get_indicator(&self, name: DatasetName) -> Result<Dataset> {
        if name == DatasetName::Budget {
            return Err(ReportError::InvalidRequest(
                "budget is not an economic indicator".to_string(),
            ));
        }
        self.get_or_fetch(name, Jurisdiction::Federal).await
    }

    /// Dataset `name` in the scope a report for `jurisdiction` needs
    ///
    /// Indicators are always national, whatever the jurisdiction.
    pub async fn get(&self, name: DatasetName, jurisdiction: Jurisdiction) -> Result<Dataset> {
        match name {
            DatasetName::Budget => self.get_budget(jurisdiction).await,
            indicator => self.get_indicator(indicator).await,
        }
    }

    /// Drop the cached copy of a dataset
    pub async fn invalidate(&self, name: DatasetName, scope: Jurisdiction) {
        let key = self.store.key(name, scope);
        if let Err(e) = self.store.remove(&key).await {
            warn!("Failed to invalidate cache entry {}: {}", key, e);
        }
    }

    async fn get_or_fetch(&self, name: DatasetName, scope: Jurisdiction) -> Result<Dataset> {
        let key = self.store.key(name, scope);

        match self.store.get(&key).await {
            Ok(Some(dataset)) => {
                debug!("Cache hit for key: {}", key);
                return Ok(dataset);
            }
            Ok(None) => debug!("Cache miss for key: {}", key),
            Err(e) => warn!("Cache read failed for {}, fetching from source: {}", key, e),
        }

        let fetch = match name {
            DatasetName::Budget => self.source.fetch_budget(scope),
            indicator => self.source.fetch_indicator(indicator),
        };

        let dataset = tokio::time::timeout(self.request_timeout, fetch)
            .await
            .map_err(|_| ReportError::SourceUnavailable {
                dataset: name,
                reason: format!("timed out after {:?}", self.request_timeout),
            })??;

        // A malformed dataset is still returned so the aggregator can report it
        if let Err(e) = dataset.validate() {
            warn!("Not caching {}: {}", key, e);
        } else if let Err(e) = self.store.put(&key, &dataset, self.ttl(name)).await {
            warn!("Failed to cache {}: {}", key, e);
        }

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheEntry, CacheError, ManualClock, MemoryBackend};
    use crate::dataset::{PeriodKind, Province};
    use crate::source::MockSourceFetcher;
    use async_trait::async_trait;

    fn config() -> WatchdogConfig {
        WatchdogConfig::builder()
            .ttl_budget(Duration::from_secs(3600))
            .ttl_indicator(Duration::from_secs(60))
            .request_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    fn dataset(name: DatasetName, scope: Jurisdiction, first: f64) -> Dataset {
        Dataset::single(
            name,
            scope,
            PeriodKind::Year,
            vec!["2022".into(), "2023".into()],
            vec![first, first + 1.0],
        )
        .unwrap()
    }

    async fn store_with_clock() -> (Arc<CacheStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::from_backend(Arc::new(MemoryBackend::new())).with_clock(clock.clone());
        store.initialize().await.unwrap();
        (Arc::new(store), clock)
    }

    #[tokio::test]
    async fn test_hit_skips_source() {
        let (store, _) = store_with_clock().await;
        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_indicator()
            .times(1)
            .returning(|name| Ok(dataset(name, Jurisdiction::Federal, 1.0)));

        let fetcher = CachedFetcher::new(Arc::new(source), store, &config());

        let first = fetcher.get_indicator(DatasetName::GdpGrowth).await.unwrap();
        let second = fetcher.get_indicator(DatasetName::GdpGrowth).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched_with_class_ttl() {
        let (store, clock) = store_with_clock().await;
        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_indicator()
            .times(2)
            .returning(|name| Ok(dataset(name, Jurisdiction::Federal, 1.0)));
        source
            .expect_fetch_budget()
            .times(1)
            .returning(|j| Ok(dataset(DatasetName::Budget, j, 100.0)));

        let fetcher = CachedFetcher::new(Arc::new(source), store, &config());
        fetcher.get_indicator(DatasetName::InflationRate).await.unwrap();
        fetcher.get_budget(Jurisdiction::Federal).await.unwrap();

        // Past the indicator TTL, well within the budget TTL
        clock.advance(Duration::from_secs(61));

        fetcher.get_indicator(DatasetName::InflationRate).await.unwrap();
        fetcher.get_budget(Jurisdiction::Federal).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::from_backend(backend.clone());
        store.initialize().await.unwrap();

        let mut source = MockSourceFetcher::new();
        source.expect_fetch_budget().times(1).returning(|_| {
            Err(ReportError::SourceDataInvalid {
                dataset: DatasetName::Budget,
                reason: "broken".to_string(),
            })
        });

        let fetcher = CachedFetcher::new(Arc::new(source), Arc::new(store), &config());
        let err = fetcher
            .get_budget(Jurisdiction::Province(Province::Ontario))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::SourceDataInvalid { .. }));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_refetch_failure_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CacheStore::from_backend(backend.clone()).with_clock(clock.clone()));
        store.initialize().await.unwrap();

        let mut source = MockSourceFetcher::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch_budget()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|j| Ok(dataset(DatasetName::Budget, j, 100.0)));
        source
            .expect_fetch_budget()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ReportError::SourceUnavailable {
                    dataset: DatasetName::Budget,
                    reason: "down".to_string(),
                })
            });

        let fetcher = CachedFetcher::new(Arc::new(source), store.clone(), &config());
        fetcher.get_budget(Jurisdiction::Federal).await.unwrap();
        let key = store.key(DatasetName::Budget, Jurisdiction::Federal);
        let before = backend.load(key.as_str()).await.unwrap().unwrap();

        clock.advance(Duration::from_secs(3601));
        let err = fetcher.get_budget(Jurisdiction::Federal).await.unwrap_err();
        assert!(err.is_retryable());

        // The prior entry is untouched and nothing replaced it
        assert_eq!(backend.len().await, 1);
        assert_eq!(backend.load(key.as_str()).await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn test_malformed_dataset_is_returned_but_not_cached() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CacheStore::from_backend(backend.clone()));
        store.initialize().await.unwrap();

        let mut source = MockSourceFetcher::new();
        source.expect_fetch_indicator().times(2).returning(|name| {
            let mut broken = dataset(name, Jurisdiction::Federal, 1.0);
            broken.series.insert(name.as_str().to_string(), vec![1.0]);
            Ok(broken)
        });

        let fetcher = CachedFetcher::new(Arc::new(source), store, &config());
        let first = fetcher.get_indicator(DatasetName::GdpGrowth).await.unwrap();
        assert!(first.validate().is_err());
        assert!(backend.is_empty().await);

        // Nothing was cached, so the next caller goes back to the source
        fetcher.get_indicator(DatasetName::GdpGrowth).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_leaves_fresh_entry_of_other_scope_untouched() {
        let (store, _) = store_with_clock().await;
        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_budget()
            .withf(|j| *j == Jurisdiction::Federal)
            .times(1)
            .returning(|j| Ok(dataset(DatasetName::Budget, j, 1.0)));
        source
            .expect_fetch_budget()
            .withf(|j| *j == Jurisdiction::Province(Province::Alberta))
            .times(1)
            .returning(|_| {
                Err(ReportError::SourceUnavailable {
                    dataset: DatasetName::Budget,
                    reason: "down".to_string(),
                })
            });

        let fetcher = CachedFetcher::new(Arc::new(source), store.clone(), &config());
        let federal = fetcher.get_budget(Jurisdiction::Federal).await.unwrap();
        let alberta = Jurisdiction::Province(Province::Alberta);
        assert!(fetcher.get_budget(alberta).await.is_err());

        let federal_key = store.key(DatasetName::Budget, Jurisdiction::Federal);
        assert_eq!(store.get(&federal_key).await.unwrap(), Some(federal));
        let alberta_key = store.key(DatasetName::Budget, alberta);
        assert_eq!(store.get(&alberta_key).await.unwrap(), None);
    }

    /// Backend that is always down
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        fn name(&self) -> &'static str {
            "down"
        }
        async fn load(&self, _key: &str) -> std::result::Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn store(&self, _key: &str, _entry: CacheEntry) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn remove(&self, _key: &str) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn clear(&self) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_always_fetch() {
        let store = CacheStore::from_backend(Arc::new(DownBackend));
        store.initialize().await.unwrap();

        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_indicator()
            .times(2)
            .returning(|name| Ok(dataset(name, Jurisdiction::Federal, 1.0)));

        let fetcher = CachedFetcher::new(Arc::new(source), Arc::new(store), &config());
        assert!(fetcher.get_indicator(DatasetName::EmploymentGrowth).await.is_ok());
        assert!(fetcher.get_indicator(DatasetName::EmploymentGrowth).await.is_ok());
    }

    #[tokio::test]
    async fn test_uninitialized_store_still_serves() {
        let store = Arc::new(CacheStore::new(crate::cache::CacheBackendConfig::Memory));
        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_budget()
            .times(1)
            .returning(|j| Ok(dataset(DatasetName::Budget, j, 1.0)));

        let fetcher = CachedFetcher::new(Arc::new(source), store, &config());
        assert!(fetcher.get_budget(Jurisdiction::Federal).await.is_ok());
    }

    /// Source that never answers in time
    struct HangingSource;

    #[async_trait]
    impl SourceFetcher for HangingSource {
        async fn fetch_budget(&self, _jurisdiction: Jurisdiction) -> Result<Dataset> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ReportError::SourceUnavailable {
                dataset: DatasetName::Budget,
                reason: "unreachable".into(),
            })
        }
        async fn fetch_indicator(&self, name: DatasetName) -> Result<Dataset> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(dataset(name, Jurisdiction::Federal, 0.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_source_unavailable_and_not_cached() {
        let (store, _) = store_with_clock().await;
        let fetcher = CachedFetcher::new(Arc::new(HangingSource), store.clone(), &config());

        let err = fetcher.get_indicator(DatasetName::GdpGrowth).await.unwrap_err();
        match err {
            ReportError::SourceUnavailable { dataset, reason } => {
                assert_eq!(dataset, DatasetName::GdpGrowth);
                assert!(reason.contains("timed out"));
            }
            other => panic!("Expected SourceUnavailable, got {other:?}"),
        }

        let key = store.key(DatasetName::GdpGrowth, Jurisdiction::Federal);
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_dispatches_by_name() {
        let (store, _) = store_with_clock().await;
        let mut source = MockSourceFetcher::new();
        source
            .expect_fetch_budget()
            .times(1)
            .returning(|j| Ok(dataset(DatasetName::Budget, j, 1.0)));
        source
            .expect_fetch_indicator()
            .times(1)
            .returning(|name| Ok(dataset(name, Jurisdiction::Federal, 1.0)));

        let fetcher = CachedFetcher::new(Arc::new(source), store, &config());
        let quebec = Jurisdiction::Province(Province::Quebec);

        let budget = fetcher.get(DatasetName::Budget, quebec).await.unwrap();
        assert_eq!(budget.scope, quebec);
        let gdp = fetcher.get(DatasetName::GdpGrowth, quebec).await.unwrap();
        assert_eq!(gdp.scope, Jurisdiction::Federal);

        assert!(matches!(
            fetcher.get_indicator(DatasetName::Budget).await,
            Err(ReportError::InvalidRequest(_))
        ));
    }
}
