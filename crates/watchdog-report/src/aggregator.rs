//! Assembles the datasets of one report request
//!
//! The four required fetches are independent, so they run as separate tokio
//! tasks. The first fatal error wins: the remaining tasks are left to finish
//! on their own (a late success still lands in the cache) and the error is
//! returned as-is.

use crate::dataset::{Dataset, DatasetName, Jurisdiction};
use crate::error::{ReportError, Result};
use crate::fetcher::CachedFetcher;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument};

/// Every dataset a report needs, keyed by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportBundle {
    jurisdiction: Jurisdiction,
    datasets: BTreeMap<DatasetName, Dataset>,
}

impl ReportBundle {
    pub(crate) fn new(jurisdiction: Jurisdiction, datasets: BTreeMap<DatasetName, Dataset>) -> Self {
        Self {
            jurisdiction,
            datasets,
        }
    }

    /// Jurisdiction the budget dataset covers
    pub fn jurisdiction(&self) -> Jurisdiction {
        self.jurisdiction
    }

    pub fn get(&self, name: DatasetName) -> Option<&Dataset> {
        self.datasets.get(&name)
    }

    pub fn budget(&self) -> Option<&Dataset> {
        self.get(DatasetName::Budget)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatasetName, &Dataset)> {
        self.datasets.iter()
    }

    pub fn into_datasets(self) -> BTreeMap<DatasetName, Dataset> {
        self.datasets
    }
}

/// Datasets a report for `jurisdiction` needs, with the scope each must have
pub fn required_datasets(jurisdiction: Jurisdiction) -> [(DatasetName, Jurisdiction); 4] {
    [
        (DatasetName::Budget, jurisdiction),
        (DatasetName::GdpGrowth, Jurisdiction::Federal),
        (DatasetName::InflationRate, Jurisdiction::Federal),
        (DatasetName::EmploymentGrowth, Jurisdiction::Federal),
    ]
}

/// Fetches everything one report needs, or nothing
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<CachedFetcher>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<CachedFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Arc<CachedFetcher> {
        &self.fetcher
    }

    /// Build the bundle for one report request
    #[instrument(skip_all, fields(jurisdiction = %jurisdiction))]
    pub async fn aggregate(&self, jurisdiction: Jurisdiction) -> Result<ReportBundle> {
        info!("Aggregating report data");

        let tasks = required_datasets(jurisdiction).map(|(name, scope)| {
            let fetcher = Arc::clone(&self.fetcher);
            let handle = tokio::spawn(
                async move { fetcher.get(name, scope).await }.in_current_span(),
            );
            async move {
                handle.await.map_err(|e| {
                    error!(dataset = %name, "Fetch task failed: {}", e);
                    ReportError::AssertionFailed {
                        dataset: name,
                        reason: format!("fetch task did not complete: {e}"),
                    }
                })?
            }
        });

        let datasets = try_join_all(tasks).await.inspect_err(|e| {
            info!("Aggregation failed: {}", e);
        })?;

        let mut bundle = BTreeMap::new();
        for ((name, scope), dataset) in required_datasets(jurisdiction).into_iter().zip(datasets) {
            if let Err(e) = Self::check(name, scope, &dataset) {
                // Keep the bad copy from being served again
                self.fetcher.invalidate(name, scope).await;
                return Err(e);
            }
            bundle.insert(name, dataset);
        }

        info!("Aggregated {} datasets", bundle.len());
        Ok(ReportBundle::new(jurisdiction, bundle))
    }

    fn check(name: DatasetName, scope: Jurisdiction, dataset: &Dataset) -> Result<()> {
        let violation = if dataset.name != name {
            Some(format!("expected dataset {name}, got {}", dataset.name))
        } else if dataset.scope != scope {
            Some(format!("expected scope {scope}, got {}", dataset.scope))
        } else {
            dataset.validate().err().map(|e| e.to_string())
        };

        match violation {
            None => Ok(()),
            Some(reason) => {
                error!(
                    dataset = %name,
                    scope = %scope,
                    periods = dataset.periods.len(),
                    series = ?dataset.series.iter().map(|(k, v)| (k.as_str(), v.len())).collect::<Vec<_>>(),
                    "Dataset invariant violated after normalization: {}",
                    reason
                );
                Err(ReportError::AssertionFailed {
                    dataset: name,
                    reason,
                })
            }
        }
    }
}
