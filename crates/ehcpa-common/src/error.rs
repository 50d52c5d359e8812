//! Error types for the EHCPA viewer.

use thiserror::Error;

/// Result type alias using ViewerError.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Primary error type for viewer operations.
#[derive(Debug, Error)]
pub enum ViewerError {
    // === Catalog Errors ===
    #[error("Layer not found: {0}")]
    UnknownLayer(String),

    #[error("Layer group not found: {0}")]
    UnknownGroup(String),

    #[error("Duplicate layer key in catalog: {0}")]
    DuplicateLayer(String),

    // === Remote Service Errors ===
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ViewerError {
    /// Whether the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, ViewerError::Transport(_))
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        ViewerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::MalformedResponse(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ViewerError {
    fn from(err: serde_yaml::Error) -> Self {
        ViewerError::Config(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_malformed_response() {
        let err: ViewerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ViewerError::MalformedResponse(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_display_messages() {
        let err = ViewerError::HttpStatus {
            status: 404,
            message: "not here".to_string(),
        };
        assert_eq!(err.to_string(), "Server returned status 404: not here");
        assert_eq!(
            ViewerError::UnknownLayer("SPI_5".to_string()).to_string(),
            "Layer not found: SPI_5"
        );
    }
}
