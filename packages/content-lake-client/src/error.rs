//! Error types for the content lake client.

use thiserror::Error;

/// Result type for content lake client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Content lake client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error (missing project id, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response). `description` is the human-readable
    /// text the API returned, suitable for showing to an operator as-is.
    #[error("API error ({status}): {description}")]
    Api { status: u16, description: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// The API-provided description, when this is an API error.
    pub fn description(&self) -> Option<&str> {
        match self {
            ClientError::Api { description, .. } => Some(description),
            _ => None,
        }
    }
}
