//! # Error Types
//!
//! Typed errors for the analytics engine. Configuration problems are caught
//! before any query is issued, store failures are wrapped with the name of the
//! query that failed, and both fold into [`AnalysisError`] at the analyser
//! boundary. The binary converts everything into `anyhow::Error`.

use thiserror::Error;

/// Invalid configuration, detected when the configuration is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown timezone `{0}` (expected an IANA name such as `Europe/Berlin`)")]
    InvalidTimezone(String),

    #[error("invalid threshold `{name}`: {reason}")]
    InvalidThreshold { name: &'static str, reason: String },

    #[error("unknown sort mode `{0}` (expected `dormancy` or `listens`)")]
    UnknownSortMode(String),

    #[error("unknown subject `{0}` (expected `artist` or `album`)")]
    UnknownSubject(String),

    #[error("unknown analyser `{0}` (expected one of: report, forgotten, patterns, gaps)")]
    UnknownAnalyser(String),

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("cannot parse timestamp `{0}`")]
    InvalidTimestamp(String),
}

/// A failure surfaced by the [`Store`](crate::store::Store), tagged with the
/// query that produced it.
#[derive(Debug, Error)]
#[error("query `{operation}` failed")]
pub struct QueryError {
    pub operation: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl QueryError {
    pub fn new<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            operation,
            source: Box::new(source),
        }
    }
}

/// Everything an [`Analyser`](crate::analysis::Analyser) run can fail with.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_keeps_operation_and_source() {
        let err = QueryError::new("total_scrobbles", std::fmt::Error);
        assert_eq!(err.operation, "total_scrobbles");
        assert_eq!(err.to_string(), "query `total_scrobbles` failed");
        assert!(std::error::Error::source(&err).is_some(), "Source must be preserved");
    }

    #[test]
    fn test_analysis_error_is_transparent() {
        let err: AnalysisError = ConfigError::UnknownSortMode("newest".to_string()).into();
        assert!(err.to_string().contains("newest"));
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
