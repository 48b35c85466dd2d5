//! Configuration for the report data pipeline

use crate::cache::{CacheBackendConfig, CacheStore};
use crate::dataset::{DatasetClass, DatasetName};
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider series identifiers of the national indicators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub gdp_growth: String,
    pub inflation_rate: String,
    pub employment_growth: String,
}

impl Default for IndicatorSeries {
    fn default() -> Self {
        Self {
            gdp_growth: DatasetName::GdpGrowth.as_str().to_string(),
            inflation_rate: DatasetName::InflationRate.as_str().to_string(),
            employment_growth: DatasetName::EmploymentGrowth.as_str().to_string(),
        }
    }
}

impl IndicatorSeries {
    /// Series id of an indicator; `None` for the budget dataset
    pub fn series_id(&self, name: DatasetName) -> Option<&str> {
        match name {
            DatasetName::Budget => None,
            DatasetName::GdpGrowth => Some(&self.gdp_growth),
            DatasetName::InflationRate => Some(&self.inflation_rate),
            DatasetName::EmploymentGrowth => Some(&self.employment_growth),
        }
    }
}

/// Configuration for the report data pipeline
///
/// Supplied once at startup and never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Cache TTL for budget datasets
    pub ttl_budget: Duration,

    /// Cache TTL for economic indicators
    pub ttl_indicator: Duration,

    /// Upper bound of one provider call
    pub request_timeout: Duration,

    /// Provider requests allowed per minute
    pub rate_limit_per_minute: u32,

    /// Base URL of the budget data provider
    pub budget_base_url: String,

    /// Base URL of the economic indicator provider
    pub indicator_base_url: String,

    /// Provider API key (optional)
    pub api_key: Option<String>,

    /// Series ids requested from the indicator provider
    pub indicator_series: IndicatorSeries,

    /// Cache backend connection parameters
    pub cache_backend: CacheBackendConfig,

    /// Prefix of every cache key
    pub cache_key_prefix: String,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            ttl_budget: Duration::from_secs(24 * 3600),     // 1 day
            ttl_indicator: Duration::from_secs(3600),       // 1 hour
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 120,
            budget_base_url: "http://127.0.0.1:8080".to_string(),
            indicator_base_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            indicator_series: IndicatorSeries::default(),
            cache_backend: CacheBackendConfig::Memory,
            cache_key_prefix: CacheStore::DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl WatchdogConfig {
    /// Create a new configuration builder
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }

    /// Defaults overridden by `WATCHDOG_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Cache store for the configured backend and key prefix
    ///
    /// Not connected yet; call [`CacheStore::initialize`] before use.
    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(self.cache_backend.clone()).with_key_prefix(self.cache_key_prefix.clone())
    }

    /// TTL of a dataset class
    pub fn ttl_for(&self, class: DatasetClass) -> Duration {
        match class {
            DatasetClass::Budget => self.ttl_budget,
            DatasetClass::Indicator => self.ttl_indicator,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ttl_budget.is_zero() || self.ttl_indicator.is_zero() {
            return Err(ReportError::ConfigError(
                "cache TTLs must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ReportError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(ReportError::ConfigError(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        for (field, value) in [
            ("budget_base_url", &self.budget_base_url),
            ("indicator_base_url", &self.indicator_base_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                ReportError::ConfigError(format!("{field} is not a valid URL ({value}): {e}"))
            })?;
        }

        if let CacheBackendConfig::Redis { url } = &self.cache_backend {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ReportError::ConfigError(format!(
                    "Redis URL must start with redis:// or rediss:// ({url})"
                )));
            }
        }

        if self.cache_key_prefix.is_empty() {
            return Err(ReportError::ConfigError(
                "cache_key_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for WatchdogConfig
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    ttl_budget: Option<Duration>,
    ttl_indicator: Option<Duration>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    budget_base_url: Option<String>,
    indicator_base_url: Option<String>,
    api_key: Option<String>,
    indicator_series: Option<IndicatorSeries>,
    cache_backend: Option<CacheBackendConfig>,
    cache_key_prefix: Option<String>,
    env_error: Option<String>,
}

impl WatchdogConfigBuilder {
    /// Set cache TTL for budget data
    pub fn ttl_budget(mut self, duration: Duration) -> Self {
        self.ttl_budget = Some(duration);
        self
    }

    /// Set cache TTL for indicators
    pub fn ttl_indicator(mut self, duration: Duration) -> Self {
        self.ttl_indicator = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    pub fn budget_base_url(mut self, url: impl Into<String>) -> Self {
        self.budget_base_url = Some(url.into());
        self
    }

    pub fn indicator_base_url(mut self, url: impl Into<String>) -> Self {
        self.indicator_base_url = Some(url.into());
        self
    }

    /// Set provider API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn indicator_series(mut self, series: IndicatorSeries) -> Self {
        self.indicator_series = Some(series);
        self
    }

    pub fn cache_backend(mut self, backend: CacheBackendConfig) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = Some(prefix.into());
        self
    }

    /// Load overrides from `WATCHDOG_*` environment variables
    pub fn with_env(self) -> Self {
        self.with_lookup(|name| std::env::var(name).ok())
    }

    /// Load overrides through an arbitrary variable lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut secs = |name: &str| -> Option<Duration> {
            let raw = lookup(name)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(Duration::from_secs(v)),
                Err(_) => {
                    self.env_error
                        .get_or_insert_with(|| format!("{name} must be a number of seconds, got '{raw}'"));
                    None
                }
            }
        };

        let ttl_budget = secs("WATCHDOG_TTL_BUDGET_SECS");
        let ttl_indicator = secs("WATCHDOG_TTL_INDICATOR_SECS");
        let request_timeout = secs("WATCHDOG_REQUEST_TIMEOUT_SECS");

        if let Some(v) = ttl_budget {
            self.ttl_budget = Some(v);
        }
        if let Some(v) = ttl_indicator {
            self.ttl_indicator = Some(v);
        }
        if let Some(v) = request_timeout {
            self.request_timeout = Some(v);
        }
        if let Some(raw) = lookup("WATCHDOG_RATE_LIMIT_PER_MINUTE") {
            match raw.trim().parse::<u32>() {
                Ok(v) => self.rate_limit_per_minute = Some(v),
                Err(_) => {
                    self.env_error.get_or_insert_with(|| {
                        format!("WATCHDOG_RATE_LIMIT_PER_MINUTE must be a number, got '{raw}'")
                    });
                }
            }
        }
        if let Some(url) = lookup("WATCHDOG_BUDGET_URL") {
            self.budget_base_url = Some(url);
        }
        if let Some(url) = lookup("WATCHDOG_INDICATOR_URL") {
            self.indicator_base_url = Some(url);
        }
        if let Some(key) = lookup("WATCHDOG_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("WATCHDOG_REDIS_URL") {
            self.cache_backend = Some(CacheBackendConfig::Redis { url });
        }
        if let Some(prefix) = lookup("WATCHDOG_CACHE_PREFIX") {
            self.cache_key_prefix = Some(prefix);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<WatchdogConfig> {
        if let Some(e) = self.env_error {
            return Err(ReportError::ConfigError(e));
        }

        let defaults = WatchdogConfig::default();

        let config = WatchdogConfig {
            ttl_budget: self.ttl_budget.unwrap_or(defaults.ttl_budget),
            ttl_indicator: self.ttl_indicator.unwrap_or(defaults.ttl_indicator),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            budget_base_url: self.budget_base_url.unwrap_or(defaults.budget_base_url),
            indicator_base_url: self.indicator_base_url.unwrap_or(defaults.indicator_base_url),
            api_key: self.api_key,
            indicator_series: self.indicator_series.unwrap_or(defaults.indicator_series),
            cache_backend: self.cache_backend.unwrap_or(defaults.cache_backend),
            cache_key_prefix: self.cache_key_prefix.unwrap_or(defaults.cache_key_prefix),
        };

        config.validate()?;
        Ok(config)
    }
}
