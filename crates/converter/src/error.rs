//! Error types for `openapi-mcp-converter`.

use thiserror::Error;

/// Main error type for the conversion engine and the tool invokers.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Document errors (no document loaded, unparseable or unsupported spec).
    #[error("Document error: {0}")]
    Document(String),

    /// Per-operation conversion failures. Conversion is fail-fast: a broken
    /// operation aborts the whole build instead of producing a partial tool set.
    #[error("Conversion error for {method} {path}: {message}")]
    Conversion {
        method: String,
        path: String,
        message: String,
    },

    /// Configuration errors (no usable server address resolvable at call time).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invocation errors (URL construction, body serialization, network,
    /// response read). Scoped to a single tool call.
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConvertError {
    /// Wrap an error as a conversion failure for one operation, preserving the
    /// operation identity for logging.
    #[must_use]
    pub fn conversion(method: &str, path: &str, message: impl Into<String>) -> Self {
        ConvertError::Conversion {
            method: method.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for conversion and invocation operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
