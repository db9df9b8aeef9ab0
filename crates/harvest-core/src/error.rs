use thiserror::Error;

/// Application-wide error types for Harvest.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a source).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Fetched content could not be turned into records.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Writing a payload to the archive backend failed.
    #[error("Archive error for key '{key}': {message}")]
    ArchiveError { key: String, message: String },

    /// Invalid configuration (environment, jobs file, dependency pair).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A job panicked while running.
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the error came from reaching the remote source
    /// rather than from the content it returned.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::NetworkError(_) | AppError::Timeout(_))
    }

    /// Short machine-readable label, used in job statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::HttpError(_) => "http",
            AppError::NetworkError(_) => "network",
            AppError::Timeout(_) => "timeout",
            AppError::ParseError(_) => "parse",
            AppError::SerializationError(_) => "serialization",
            AppError::ArchiveError { .. } => "archive",
            AppError::ConfigError(_) => "config",
            AppError::JobPanicked(_) => "panic",
            AppError::Generic(_) => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors() {
        assert!(AppError::NetworkError("reset".into()).is_transport());
        assert!(AppError::Timeout(30).is_transport());
        // Classified by variant only, never by message text.
        assert!(!AppError::HttpError("connect refused".into()).is_transport());
        assert!(!AppError::HttpError("upstream timeout page".into()).is_transport());
        assert!(!AppError::HttpError("HTTP 404 for https://example.com".into()).is_transport());
        assert!(!AppError::ParseError("not json".into()).is_transport());
    }

    #[test]
    fn test_archive_error_message() {
        let err = AppError::ArchiveError {
            key: "stats.json".into(),
            message: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "Archive error for key 'stats.json': disk full"
        );
        assert_eq!(err.kind(), "archive");
    }
}
