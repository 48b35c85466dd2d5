//! Logging settings shared by every watchdog binary

use serde::{Deserialize, Serialize};

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one event per line
    #[default]
    Pretty,
    /// Newline-delimited JSON for log shippers
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "warn,watchdog_report=info,watchdog_cli=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Use the given default filter
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Use the given output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}
