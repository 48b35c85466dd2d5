//! Error types for the report data pipeline

use crate::cache::CacheError;
use crate::dataset::DatasetName;
use thiserror::Error;

/// Report pipeline errors
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// External provider unreachable, timed out or answered with an error status
    #[error("Source unavailable for {dataset}: {reason}")]
    SourceUnavailable {
        dataset: DatasetName,
        reason: String,
    },

    /// Provider answered but the payload could not be normalized
    #[error("Source data invalid for {dataset}: {reason}")]
    SourceDataInvalid {
        dataset: DatasetName,
        reason: String,
    },

    /// Cache backend could not be reached
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// An internal invariant was violated after normalization
    #[error("Assertion failed for {dataset}: {reason}")]
    AssertionFailed {
        dataset: DatasetName,
        reason: String,
    },

    /// Malformed report request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Render boundary failed
    #[error("Render error: {0}")]
    RenderError(String),
}

impl ReportError {
    /// Whether the caller may reasonably retry the request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }

    /// Dataset the error is attributed to, if any
    pub fn dataset(&self) -> Option<DatasetName> {
        match self {
            Self::SourceUnavailable { dataset, .. }
            | Self::SourceDataInvalid { dataset, .. }
            | Self::AssertionFailed { dataset, .. } => Some(*dataset),
            _ => None,
        }
    }
}

impl From<CacheError> for ReportError {
    fn from(err: CacheError) -> Self {
        ReportError::CacheUnavailable(err.to_string())
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReportError::SourceUnavailable {
            dataset: DatasetName::Budget,
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Source unavailable for budget: connection refused"
        );

        let err = ReportError::InvalidRequest("Invalid government level".to_string());
        assert_eq!(err.to_string(), "Invalid request: Invalid government level");
    }

    #[test]
    fn test_retryable_classification() {
        let unavailable = ReportError::SourceUnavailable {
            dataset: DatasetName::GdpGrowth,
            reason: "timeout".to_string(),
        };
        let invalid = ReportError::SourceDataInvalid {
            dataset: DatasetName::GdpGrowth,
            reason: "length mismatch".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.dataset(), Some(DatasetName::GdpGrowth));
        assert_eq!(ReportError::ConfigError("x".into()).dataset(), None);
    }

    #[test]
    fn test_cache_error_conversion() {
        let err: ReportError = CacheError::Unavailable("redis down".to_string()).into();
        match err {
            ReportError::CacheUnavailable(msg) => assert!(msg.contains("redis down")),
            other => panic!("Expected CacheUnavailable, got {other:?}"),
        }
    }
}
