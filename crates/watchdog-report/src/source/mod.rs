//! External data providers
//!
//! A [`SourceFetcher`] turns one provider response into one [`Dataset`]. It
//! never caches and never retries; malformed payloads are rejected here with
//! `SourceDataInvalid` so nothing downstream sees them.

mod http;

pub use http::HttpSourceFetcher;

use crate::dataset::{Dataset, DatasetName, Jurisdiction};
use crate::error::Result;
use async_trait::async_trait;

/// Retrieves one named dataset from its authoritative provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Years, revenue, expenses, net debt and deficit of one jurisdiction
    async fn fetch_budget(&self, jurisdiction: Jurisdiction) -> Result<Dataset>;

    /// National series of `gdp_growth`, `inflation_rate` or `employment_growth`
    async fn fetch_indicator(&self, name: DatasetName) -> Result<Dataset>;
}
