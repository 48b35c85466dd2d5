//! Report requests and the service that answers them

mod render;

pub use render::{ChartDataRenderer, ChartKind, ChartSpec, RenderedReport, ReportRenderer, TableRow};

use crate::aggregator::Aggregator;
use crate::dataset::{Jurisdiction, Province};
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

const REPORT_CONTENT: &str = "Generated using real-time government and economic data.";

/// What a caller asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// `Federal` or `Province`
    pub government_level: String,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub company_email: Option<String>,
}

impl ReportRequest {
    pub fn federal() -> Self {
        Self {
            government_level: "Federal".to_string(),
            province: None,
            user_name: None,
            company_email: None,
        }
    }

    pub fn province(province: impl Into<String>) -> Self {
        Self {
            government_level: "Province".to_string(),
            province: Some(province.into()),
            user_name: None,
            company_email: None,
        }
    }

    pub fn with_user(mut self, user_name: impl Into<String>, company_email: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self.company_email = Some(company_email.into());
        self
    }

    /// Resolve the request to a jurisdiction
    pub fn jurisdiction(&self) -> Result<Jurisdiction> {
        let level = self.government_level.trim();
        if level.eq_ignore_ascii_case("federal") {
            return Ok(Jurisdiction::Federal);
        }
        if !level.eq_ignore_ascii_case("province") {
            return Err(ReportError::InvalidRequest("Invalid government level".to_string()));
        }

        let name = self
            .province
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ReportError::InvalidRequest("Province is required for a provincial report".to_string()))?;

        name.parse::<Province>()
            .map(Jurisdiction::Province)
            .map_err(|_| ReportError::InvalidRequest(format!("Unknown province: {name}")))
    }

    /// Metadata for the report this request produces
    pub fn metadata(&self) -> Result<ReportMetadata> {
        let jurisdiction = self.jurisdiction()?;
        let level = if jurisdiction.is_federal() { "Federal" } else { "Province" };

        Ok(ReportMetadata {
            title: format!("Financial Report: {level} - {}", jurisdiction.display_name()),
            content: REPORT_CONTENT.to_string(),
            user_name: self.user_name.clone(),
            company_email: self.company_email.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
    pub title: String,
    pub content: String,
    pub user_name: Option<String>,
    pub company_email: Option<String>,
}

/// Validates, aggregates, renders
pub struct ReportService {
    aggregator: Aggregator,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportService {
    pub fn new(aggregator: Aggregator) -> Self {
        Self::with_renderer(aggregator, Arc::new(ChartDataRenderer::new()))
    }

    pub fn with_renderer(aggregator: Aggregator, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { aggregator, renderer }
    }

    #[instrument(skip_all, fields(level = %request.government_level))]
    pub async fn generate(&self, request: &ReportRequest) -> Result<RenderedReport> {
        let jurisdiction = request.jurisdiction()?;
        let metadata = request.metadata()?;

        let bundle = self.aggregator.aggregate(jurisdiction).await?;
        let report = self.renderer.render(&metadata, &bundle)?;

        info!(
            charts = report.charts.len(),
            rows = report.tables.len(),
            "Generated report: {}",
            report.title
        );
        Ok(report)
    }
}
