//! Fiscal watchdog report pipeline
//!
//! This crate gathers the data behind a government financial report and
//! keeps it cached between requests. It includes:
//!
//! - A cache store with per-entry TTL over an in-memory or Redis backend
//! - An HTTP source fetcher for budget and economic indicator series
//! - A cache-aside fetcher that only caches successful fetches
//! - An aggregator that fetches the four datasets of a report concurrently
//! - A chart-data renderer and the service tying it all together
//!
//! # Architecture
//!
//! `ReportService` validates a `ReportRequest`, asks the `Aggregator` for a
//! `ReportBundle` and hands it to a `ReportRenderer`. The aggregator drives one
//! `CachedFetcher` per dataset; the fetcher reads the `CacheStore` first and
//! falls back to a `SourceFetcher`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchdog_report::{
//!     Aggregator, CacheStore, CachedFetcher, HttpSourceFetcher, ReportRequest, ReportService,
//!     WatchdogConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WatchdogConfig::from_env()?;
//!
//!     let store = Arc::new(config.cache_store());
//!     store.initialize().await?;
//!
//!     let source = Arc::new(HttpSourceFetcher::new(&config)?);
//!     let fetcher = Arc::new(CachedFetcher::new(source, store.clone(), &config));
//!     let service = ReportService::new(Aggregator::new(fetcher));
//!
//!     let report = service.generate(&ReportRequest::province("Ontario")).await?;
//!     println!("{}", report.title);
//!
//!     store.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod report;
pub mod source;

// Re-export main types for convenience
pub use aggregator::{Aggregator, ReportBundle};
pub use cache::{CacheBackendConfig, CacheError, CacheKey, CacheStore};
pub use config::{IndicatorSeries, WatchdogConfig};
pub use dataset::{Dataset, DatasetClass, DatasetName, Jurisdiction, PeriodKind, Province};
pub use error::{ReportError, Result};
pub use fetcher::CachedFetcher;
pub use report::{ChartDataRenderer, RenderedReport, ReportMetadata, ReportRenderer, ReportRequest, ReportService};
pub use source::{HttpSourceFetcher, SourceFetcher};
