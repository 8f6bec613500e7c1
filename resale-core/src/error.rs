//! Error types for the resale-core crate.

use crate::data::record::RowId;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unrecognized era tag, or a header that does not carry the era's required columns.
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// A mandatory field is missing or unparsable. Row-level: the row is dropped and counted.
    #[error("Malformed record {row}: field '{field}' {reason}")]
    MalformedRecord {
        row: RowId,
        field: &'static str,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

impl PipelineError {
    pub fn unknown_schema(msg: impl Into<String>) -> Self {
        Self::UnknownSchema(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn malformed(row: RowId, field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            row,
            field,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller may retry the failed operation unchanged.
    ///
    /// Only I/O failures qualify; schema, record and configuration errors are deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Csv { source, .. } => source.is_io_error(),
            _ => false,
        }
    }
}

/// Attach a path to a bare `io::Error`.
pub(crate) trait IoContext<T> {
    fn at(self, path: &std::path::Path) -> Result<T, PipelineError>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn at(self, path: &std::path::Path) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::io(path, e))
    }
}

impl<T> IoContext<T> for Result<T, csv::Error> {
    fn at(self, path: &std::path::Path) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::csv(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_retryable() {
        let err = PipelineError::io(
            "/tmp/out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("/tmp/out"));
    }

    #[test]
    fn test_schema_errors_are_not_retryable() {
        assert!(!PipelineError::unknown_schema("era '1980'").is_retryable());
        assert!(!PipelineError::config("bad ratio").is_retryable());
    }

    #[test]
    fn test_malformed_display_names_row_and_field() {
        let err = PipelineError::malformed(RowId::new(2, 17), "resale_price", "is missing");
        assert_eq!(
            err.to_string(),
            "Malformed record 2:17: field 'resale_price' is missing"
        );
    }
}
