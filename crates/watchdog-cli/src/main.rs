//! Command-line interface for the fiscal watchdog
//!
//! # Usage
//!
//! ```bash
//! # Federal report as tables
//! watchdog report --level federal
//!
//! # Provincial report as JSON, cached in Redis
//! export WATCHDOG_REDIS_URL="redis://127.0.0.1:6379/0"
//! watchdog report --level province --province Ontario --format json
//!
//! # Validate configuration and reach the cache backend
//! watchdog check
//! ```

mod output;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing::{info, warn};
use watchdog_report::{
    Aggregator, CacheStore, CachedFetcher, HttpSourceFetcher, ReportRequest, ReportService,
    WatchdogConfig,
};
use watchdog_utils::{LogConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "watchdog")]
#[command(about = "Financial reports on Canadian governments", long_about = None)]
struct Args {
    /// Log output format (pretty or json)
    #[arg(long, global = true, env = "WATCHDOG_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a report
    Report {
        /// Government level: federal or province
        #[arg(long, default_value = "federal")]
        level: String,

        /// Province name, slug or postal code
        #[arg(long)]
        province: Option<String>,

        #[arg(long)]
        user_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Validate configuration and ping the cache backend
    Check,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = LogConfig::default().with_format(args.log_format);
    if let Err(e) = watchdog_utils::try_init_tracing(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = WatchdogConfig::from_env().context("invalid configuration")?;

    let store = Arc::new(config.cache_store());

    match args.command {
        Command::Check => check(&config, &store).await,
        Command::Report {
            level,
            province,
            user_name,
            email,
            format,
        } => {
            let request = ReportRequest {
                government_level: level,
                province,
                user_name,
                company_email: email,
            };
            let result = report(&config, store.clone(), &request, format).await;
            store.shutdown().await;
            result
        }
    }
}

async fn check(config: &WatchdogConfig, store: &CacheStore) -> anyhow::Result<()> {
    println!("Configuration OK");
    println!("  Budget source:    {}", config.budget_base_url);
    println!("  Indicator source: {}", config.indicator_base_url);
    println!("  Budget TTL:       {:?}", config.ttl_budget);
    println!("  Indicator TTL:    {:?}", config.ttl_indicator);

    store.initialize().await.context("cache backend unreachable")?;
    store.ping().await.context("cache backend did not answer")?;
    println!("Cache backend OK");

    store.shutdown().await;
    Ok(())
}

async fn report(
    config: &WatchdogConfig,
    store: Arc<CacheStore>,
    request: &ReportRequest,
    format: OutputFormat,
) -> anyhow::Result<()> {
    // Reports still work without a cache, just slower
    if let Err(e) = store.initialize().await {
        warn!("Cache unavailable, fetching every dataset from source: {}", e);
    }

    let source = Arc::new(HttpSourceFetcher::new(config)?);
    let fetcher = Arc::new(CachedFetcher::new(source, store, config));
    let service = ReportService::new(Aggregator::new(fetcher));

    info!("Generating report");
    let rendered = service.generate(request).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
        OutputFormat::Table => println!("{}", output::render_tables(&rendered)),
    }

    Ok(())
}
