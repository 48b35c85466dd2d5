//! Chart and table preparation for a finished bundle

use super::ReportMetadata;
use crate::aggregator::ReportBundle;
use crate::dataset::{Dataset, DatasetName, PeriodKind, budget_series};
use crate::error::{ReportError, Result};
use serde::Serialize;

/// Turns a bundle into something a report document can be built from
pub trait ReportRenderer: Send + Sync {
    fn render(&self, metadata: &ReportMetadata, bundle: &ReportBundle) -> Result<RenderedReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

/// Data and labels for one chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    /// Stable identifier, also the file stem a plotting layer would use
    pub id: String,
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub periods: Vec<String>,
    pub values: Vec<f64>,
}

/// One fiscal year of the budget table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    #[serde(rename = "Fiscal Year")]
    pub fiscal_year: String,
    #[serde(rename = "Revenue")]
    pub revenue: String,
    #[serde(rename = "Expenses")]
    pub expenses: String,
    #[serde(rename = "Surplus/Deficit")]
    pub surplus_deficit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedReport {
    pub title: String,
    pub content: String,
    pub user_name: Option<String>,
    pub company_email: Option<String>,
    pub charts: Vec<ChartSpec>,
    pub tables: Vec<TableRow>,
}

/// Default renderer: charts as raw series, budget table as `{value}B` strings
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartDataRenderer;

impl ChartDataRenderer {
    pub fn new() -> Self {
        Self
    }

    fn chart(
        bundle: &ReportBundle,
        name: DatasetName,
        series: &str,
        id: &str,
        kind: ChartKind,
        title: &str,
        y_label: &str,
    ) -> Result<ChartSpec> {
        let dataset = required(bundle, name)?;
        let values = dataset
            .values(series)
            .ok_or_else(|| ReportError::RenderError(format!("{name} has no '{series}' series")))?;

        let x_label = match dataset.period_kind {
            PeriodKind::Year => "Year",
            PeriodKind::Month => "Month",
        };

        Ok(ChartSpec {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            periods: dataset.periods.clone(),
            values: values.to_vec(),
        })
    }

    fn budget_table(bundle: &ReportBundle) -> Result<Vec<TableRow>> {
        let budget = required(bundle, DatasetName::Budget)?;
        let column = |series: &str| {
            budget
                .values(series)
                .ok_or_else(|| ReportError::RenderError(format!("budget has no '{series}' series")))
        };
        let revenue = column(budget_series::REVENUE)?;
        let expenses = column(budget_series::EXPENSES)?;
        let deficit = column(budget_series::DEFICIT)?;

        Ok(budget
            .periods
            .iter()
            .enumerate()
            .map(|(i, year)| TableRow {
                fiscal_year: year.clone(),
                revenue: billions(revenue[i]),
                expenses: billions(expenses[i]),
                surplus_deficit: billions(deficit[i]),
            })
            .collect())
    }
}

impl ReportRenderer for ChartDataRenderer {
    fn render(&self, metadata: &ReportMetadata, bundle: &ReportBundle) -> Result<RenderedReport> {
        let charts = vec![
            Self::chart(
                bundle,
                DatasetName::Budget,
                budget_series::NET_DEBT,
                "net_debt",
                ChartKind::Line,
                "Net Debt Over Time",
                "Net Debt (Billions CAD)",
            )?,
            Self::chart(
                bundle,
                DatasetName::GdpGrowth,
                DatasetName::GdpGrowth.as_str(),
                "gdp_growth",
                ChartKind::Line,
                "GDP Growth Rate",
                "GDP Growth (%)",
            )?,
            Self::chart(
                bundle,
                DatasetName::InflationRate,
                DatasetName::InflationRate.as_str(),
                "inflation_rate",
                ChartKind::Line,
                "Inflation Rate",
                "Inflation (%)",
            )?,
            Self::chart(
                bundle,
                DatasetName::EmploymentGrowth,
                DatasetName::EmploymentGrowth.as_str(),
                "employment_growth",
                ChartKind::Bar,
                "Employment Growth Rate",
                "Employment Growth (%)",
            )?,
        ];

        Ok(RenderedReport {
            title: metadata.title.clone(),
            content: metadata.content.clone(),
            user_name: metadata.user_name.clone(),
            company_email: metadata.company_email.clone(),
            charts,
            tables: Self::budget_table(bundle)?,
        })
    }
}

fn required(bundle: &ReportBundle, name: DatasetName) -> Result<&Dataset> {
    bundle
        .get(name)
        .ok_or_else(|| ReportError::RenderError(format!("bundle is missing {name}")))
}

fn billions(value: f64) -> String {
    format!("{value}B")
}
