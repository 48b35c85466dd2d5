//! HTTP client for the budget and indicator providers
//!
//! Budget provider: `GET {budget_base_url}/budget/{jurisdiction}` returning
//! parallel `years`, `revenue`, `expenses`, `net_debt` and `deficit` arrays
//! (CAD billions).
//!
//! Indicator provider: `GET {indicator_base_url}/series/{id}/observations`
//! returning FRED-style `{"observations": [{"date", "value"}]}` where a value
//! of `"."` marks a missing observation.

use super::SourceFetcher;
use crate::config::{IndicatorSeries, WatchdogConfig};
use crate::dataset::{Dataset, DatasetName, Jurisdiction, PeriodKind, budget_series};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Period label as the budget provider sends it: `2021` or `"2021-22"`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeriodLabel {
    Year(i64),
    Text(String),
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(y) => write!(f, "{y}"),
            Self::Text(s) => f.write_str(s.trim()),
        }
    }
}

/// Budget provider response
#[derive(Debug, Deserialize)]
struct BudgetPayload {
    years: Vec<PeriodLabel>,
    revenue: Vec<f64>,
    expenses: Vec<f64>,
    net_debt: Vec<f64>,
    deficit: Vec<f64>,
}

/// Observation data from an indicator series
#[derive(Debug, Deserialize)]
struct Observation {
    /// Date of observation (YYYY-MM-DD)
    date: String,
    /// Value (can be "." for missing data)
    value: String,
}

/// Indicator observations response
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// Source fetcher talking JSON over HTTP
pub struct HttpSourceFetcher {
    client: Client,
    budget_base_url: String,
    indicator_base_url: String,
    api_key: Option<String>,
    series: IndicatorSeries,
    rate_limiter: SharedRateLimiter,
}

impl HttpSourceFetcher {
    /// Create a fetcher from the pipeline configuration
    pub fn new(config: &WatchdogConfig) -> Result<Self> {
        let per_minute = NonZeroU32::new(config.rate_limit_per_minute).ok_or_else(|| {
            ReportError::ConfigError("rate_limit_per_minute must be greater than 0".to_string())
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ReportError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            budget_base_url: config.budget_base_url.trim_end_matches('/').to_string(),
            indicator_base_url: config.indicator_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            series: config.indicator_series.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// GET a JSON document, classifying every failure for `dataset`
    async fn get_json<T: DeserializeOwned>(
        &self,
        dataset: DatasetName,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let mut request = self.client.get(url).query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        debug!("Requesting {} from {}", dataset, url);
        let response = request.send().await.map_err(|e| ReportError::SourceUnavailable {
            dataset,
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                format!("request failed: {e}")
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(dataset, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReportError::SourceUnavailable {
                dataset,
                reason: format!("failed to read response body: {e}"),
            })?;

        serde_json::from_str(&body).map_err(|e| ReportError::SourceDataInvalid {
            dataset,
            reason: format!("unexpected response shape: {e}"),
        })
    }
}

/// Outage-like statuses are retryable, anything else means the contract broke
fn classify_status(dataset: DatasetName, status: StatusCode) -> ReportError {
    let reason = format!("provider answered {status}");
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        ReportError::SourceUnavailable { dataset, reason }
    } else {
        ReportError::SourceDataInvalid { dataset, reason }
    }
}

fn normalize_budget(jurisdiction: Jurisdiction, payload: BudgetPayload) -> Result<Dataset> {
    let invalid = |reason: String| ReportError::SourceDataInvalid {
        dataset: DatasetName::Budget,
        reason,
    };

    if payload.years.is_empty() {
        return Err(invalid(format!("no budget years for {jurisdiction}")));
    }

    let periods: Vec<String> = payload.years.iter().map(ToString::to_string).collect();
    let series: BTreeMap<String, Vec<f64>> = budget_series::ALL
        .into_iter()
        .map(str::to_string)
        .zip([
            payload.revenue,
            payload.expenses,
            payload.net_debt,
            payload.deficit,
        ])
        .collect();

    Dataset::new(
        DatasetName::Budget,
        jurisdiction,
        PeriodKind::Year,
        periods,
        series,
    )
    .map_err(|e| invalid(e.to_string()))
}

fn normalize_observations(name: DatasetName, observations: Vec<Observation>) -> Result<Dataset> {
    let invalid = |reason: String| ReportError::SourceDataInvalid {
        dataset: name,
        reason,
    };

    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let raw = obs.value.trim();
        if raw == "." || raw.is_empty() {
            continue;
        }

        let date = NaiveDate::parse_from_str(obs.date.trim(), "%Y-%m-%d")
            .map_err(|e| invalid(format!("invalid observation date '{}': {e}", obs.date)))?;
        let value = raw
            .parse::<f64>()
            .map_err(|_| invalid(format!("non-numeric value '{raw}' on {date}")))?;
        if !value.is_finite() {
            return Err(invalid(format!("non-finite value '{raw}' on {date}")));
        }
        points.push((date, value));
    }

    if points.is_empty() {
        return Err(invalid("no usable observations".to_string()));
    }

    points.sort_by_key(|(date, _)| *date);

    let kind = name.period_kind();
    let format = match kind {
        PeriodKind::Year => "%Y",
        PeriodKind::Month => "%Y-%m",
    };
    let (periods, values): (Vec<String>, Vec<f64>) = points
        .into_iter()
        .map(|(date, value)| (date.format(format).to_string(), value))
        .unzip();

    Dataset::single(name, Jurisdiction::Federal, kind, periods, values)
        .map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch_budget(&self, jurisdiction: Jurisdiction) -> Result<Dataset> {
        info!("Fetching budget data for {}", jurisdiction);

        let url = format!("{}/budget/{}", self.budget_base_url, jurisdiction.slug());
        let payload: BudgetPayload = self.get_json(DatasetName::Budget, &url, &[]).await?;

        normalize_budget(jurisdiction, payload)
    }

    async fn fetch_indicator(&self, name: DatasetName) -> Result<Dataset> {
        let series_id = self.series.series_id(name).ok_or_else(|| {
            ReportError::InvalidRequest(format!("{name} is not an economic indicator"))
        })?;

        info!("Fetching indicator {} (series {})", name, series_id);

        let url = format!(
            "{}/series/{}/observations",
            self.indicator_base_url, series_id
        );
        let response: ObservationsResponse = self
            .get_json(
                name,
                &url,
                &[("file_type", "json"), ("sort_order", "asc")],
            )
            .await?;

        normalize_observations(name, response.observations)
    }
}
