//! Error types for glm-mcp
//!
//! `AppError` covers process-level failures: configuration, startup and I/O
//! on the stdio transport or the template file. Failures inside a tool
//! invocation never reach this type; they are rendered as error-flagged tool
//! results instead.

use crate::glm::ClientError;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("API key required: use --api-key flag or GLM_API_KEY env variable")]
    MissingApiKey,

    #[error("Failed to initialize GLM client: {0}")]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode protocol message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creates() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_missing_api_key_names_both_sources() {
        let msg = AppError::MissingApiKey.to_string();
        assert!(msg.contains("--api-key"));
        assert!(msg.contains("GLM_API_KEY"));
    }

    #[test]
    fn test_config_validation_error_includes_path() {
        let err = AppError::ConfigValidationFailed {
            path: "glm.toml".to_string(),
            reason: "timeout_seconds must be greater than 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration in 'glm.toml': timeout_seconds must be greater than 0"
        );
    }

    #[test]
    fn test_config_file_read_preserves_source() {
        let err = AppError::ConfigFileRead {
            path: "missing.toml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_io_error_converts() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }
}
