//! Cached report example
//!
//! Generates the same provincial report twice against the configured sources.
//! The second run is served from the in-memory cache.
//!
//! To run this example:
//! ```bash
//! export WATCHDOG_BUDGET_URL=https://budget.example.org
//! export WATCHDOG_INDICATOR_URL=https://api.stlouisfed.org/fred
//! export WATCHDOG_API_KEY=your_key_here
//!
//! cargo run --example cached_report -- Ontario
//! ```

use std::env;
use std::sync::Arc;
use std::time::Instant;
use watchdog_report::{
    Aggregator, CachedFetcher, HttpSourceFetcher, ReportRequest, ReportService,
    WatchdogConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    watchdog_utils::init_tracing();

    let province = env::args().nth(1).unwrap_or_else(|| "Ontario".to_string());
    let config = WatchdogConfig::from_env()?;

    let store = Arc::new(config.cache_store());
    store.initialize().await?;

    let source = Arc::new(HttpSourceFetcher::new(&config)?);
    let fetcher = Arc::new(CachedFetcher::new(source, store.clone(), &config));
    let service = ReportService::new(Aggregator::new(fetcher));
    let request = ReportRequest::province(province);

    for run in 1..=2 {
        let started = Instant::now();
        let report = service.generate(&request).await?;
        println!(
            "Run {run}: {} ({} charts, {} budget rows) in {:?}",
            report.title,
            report.charts.len(),
            report.tables.len(),
            started.elapsed()
        );
    }

    store.shutdown().await;
    Ok(())
}
