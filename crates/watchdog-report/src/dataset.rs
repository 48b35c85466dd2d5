//! Datasets, jurisdictions and the invariants every series must satisfy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Canadian province
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Province {
    NewfoundlandAndLabrador,
    PrinceEdwardIsland,
    NovaScotia,
    NewBrunswick,
    Quebec,
    Ontario,
    Manitoba,
    Saskatchewan,
    Alberta,
    BritishColumbia,
}

impl Province {
    /// Every province, east to west
    pub const ALL: [Province; 10] = [
        Province::NewfoundlandAndLabrador,
        Province::PrinceEdwardIsland,
        Province::NovaScotia,
        Province::NewBrunswick,
        Province::Quebec,
        Province::Ontario,
        Province::Manitoba,
        Province::Saskatchewan,
        Province::Alberta,
        Province::BritishColumbia,
    ];

    /// English display name
    pub fn name(self) -> &'static str {
        match self {
            Self::NewfoundlandAndLabrador => "Newfoundland and Labrador",
            Self::PrinceEdwardIsland => "Prince Edward Island",
            Self::NovaScotia => "Nova Scotia",
            Self::NewBrunswick => "New Brunswick",
            Self::Quebec => "Quebec",
            Self::Ontario => "Ontario",
            Self::Manitoba => "Manitoba",
            Self::Saskatchewan => "Saskatchewan",
            Self::Alberta => "Alberta",
            Self::BritishColumbia => "British Columbia",
        }
    }

    /// Two-letter postal abbreviation
    pub fn code(self) -> &'static str {
        match self {
            Self::NewfoundlandAndLabrador => "NL",
            Self::PrinceEdwardIsland => "PE",
            Self::NovaScotia => "NS",
            Self::NewBrunswick => "NB",
            Self::Quebec => "QC",
            Self::Ontario => "ON",
            Self::Manitoba => "MB",
            Self::Saskatchewan => "SK",
            Self::Alberta => "AB",
            Self::BritishColumbia => "BC",
        }
    }

    /// Lowercase identifier used in URLs and cache keys
    pub fn slug(self) -> &'static str {
        match self {
            Self::NewfoundlandAndLabrador => "newfoundland_and_labrador",
            Self::PrinceEdwardIsland => "prince_edward_island",
            Self::NovaScotia => "nova_scotia",
            Self::NewBrunswick => "new_brunswick",
            Self::Quebec => "quebec",
            Self::Ontario => "ontario",
            Self::Manitoba => "manitoba",
            Self::Saskatchewan => "saskatchewan",
            Self::Alberta => "alberta",
            Self::BritishColumbia => "british_columbia",
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Province {
    type Err = String;

    /// Accepts the display name, the slug or the postal code, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_label(s);
        if normalized == "québec" {
            return Ok(Self::Quebec);
        }

        Self::ALL
            .into_iter()
            .find(|p| {
                normalized == normalize_label(p.name())
                    || normalized == normalize_label(p.slug())
                    || normalized.eq_ignore_ascii_case(p.code())
            })
            .ok_or_else(|| format!("Unknown province: {}", s.trim()))
    }
}

fn normalize_label(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Government whose budget a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jurisdiction {
    /// Government of Canada; also the scope of every national indicator
    Federal,
    /// One provincial government
    Province(Province),
}

impl Jurisdiction {
    /// Lowercase identifier used in URLs and cache keys
    pub fn slug(self) -> &'static str {
        match self {
            Self::Federal => "federal",
            Self::Province(p) => p.slug(),
        }
    }

    /// Name shown in report titles
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Federal => "Canada",
            Self::Province(p) => p.name(),
        }
    }

    pub fn is_federal(self) -> bool {
        matches!(self, Self::Federal)
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Federal => f.write_str("Federal"),
            Self::Province(p) => write!(f, "{p}"),
        }
    }
}

impl FromStr for Jurisdiction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "federal" | "canada" | "ca" => Ok(Self::Federal),
            _ => s.parse::<Province>().map(Self::Province),
        }
    }
}

/// TTL class of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetClass {
    /// Fiscal data, published yearly
    Budget,
    /// Fast-moving economic indicator
    Indicator,
}

/// Datasets a report is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    /// Revenue, expenses, net debt and deficit of one jurisdiction
    Budget,
    GdpGrowth,
    InflationRate,
    EmploymentGrowth,
}

impl DatasetName {
    /// The national indicators every report includes
    pub const INDICATORS: [DatasetName; 3] = [
        DatasetName::GdpGrowth,
        DatasetName::InflationRate,
        DatasetName::EmploymentGrowth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::GdpGrowth => "gdp_growth",
            Self::InflationRate => "inflation_rate",
            Self::EmploymentGrowth => "employment_growth",
        }
    }

    pub fn class(self) -> DatasetClass {
        match self {
            Self::Budget => DatasetClass::Budget,
            _ => DatasetClass::Indicator,
        }
    }

    /// Granularity of the period labels the dataset is published with
    pub fn period_kind(self) -> PeriodKind {
        match self {
            Self::InflationRate => PeriodKind::Month,
            _ => PeriodKind::Year,
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "budget" => Ok(Self::Budget),
            "gdp_growth" => Ok(Self::GdpGrowth),
            "inflation_rate" => Ok(Self::InflationRate),
            "employment_growth" => Ok(Self::EmploymentGrowth),
            other => Err(format!("Unknown dataset: {other}")),
        }
    }
}

/// Period label granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// `YYYY` or fiscal `YYYY-YY`
    Year,
    /// `YYYY-MM`
    Month,
}

/// Names of the series carried by a budget dataset
pub mod budget_series {
    pub const REVENUE: &str = "revenue";
    pub const EXPENSES: &str = "expenses";
    pub const NET_DEBT: &str = "net_debt";
    pub const DEFICIT: &str = "deficit";

    pub const ALL: [&str; 4] = [REVENUE, EXPENSES, NET_DEBT, DEFICIT];
}

/// A dataset that breaks the shape invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("dataset has no value series")]
    NoSeries,

    #[error("series '{series}' has {actual} values but there are {expected} periods")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("series '{series}' has non-finite value {value} at index {index}")]
    NonFiniteValue {
        series: String,
        index: usize,
        value: f64,
    },

    #[error("period '{current}' at index {index} does not follow '{previous}'")]
    NonIncreasingPeriods {
        index: usize,
        previous: String,
        current: String,
    },
}

/// One named time series (or set of aligned series) for one scope
///
/// Invariants: at least one series, every series is as long as `periods`,
/// and `periods` is strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: DatasetName,
    pub scope: Jurisdiction,
    pub period_kind: PeriodKind,
    pub periods: Vec<String>,
    pub series: BTreeMap<String, Vec<f64>>,
}

impl Dataset {
    /// Build a dataset, rejecting one that breaks the invariants
    pub fn new(
        name: DatasetName,
        scope: Jurisdiction,
        period_kind: PeriodKind,
        periods: Vec<String>,
        series: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, InvariantViolation> {
        let dataset = Self {
            name,
            scope,
            period_kind,
            periods,
            series,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Single-series dataset, the shape of every indicator
    pub fn single(
        name: DatasetName,
        scope: Jurisdiction,
        period_kind: PeriodKind,
        periods: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self, InvariantViolation> {
        let mut series = BTreeMap::new();
        series.insert(name.as_str().to_string(), values);
        Self::new(name, scope, period_kind, periods, series)
    }

    /// Re-check the invariants of an existing value
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.series.is_empty() {
            return Err(InvariantViolation::NoSeries);
        }

        let expected = self.periods.len();
        for (series, values) in &self.series {
            if values.len() != expected {
                return Err(InvariantViolation::LengthMismatch {
                    series: series.clone(),
                    expected,
                    actual: values.len(),
                });
            }
            if let Some((index, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(InvariantViolation::NonFiniteValue {
                    series: series.clone(),
                    index,
                    value: *value,
                });
            }
        }

        for (index, pair) in self.periods.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(InvariantViolation::NonIncreasingPeriods {
                    index: index + 1,
                    previous: pair[0].clone(),
                    current: pair[1].clone(),
                });
            }
        }

        Ok(())
    }

    /// Number of periods
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Values of one series
    pub fn values(&self, series: &str) -> Option<&[f64]> {
        self.series.get(series).map(Vec::as_slice)
    }

    /// Values of the series named after the dataset itself
    pub fn primary_values(&self) -> Option<&[f64]> {
        self.values(self.name.as_str())
    }
}
