use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarborError {
    #[error("Failed to fetch {operation}({args}): {cause}")]
    RemoteFetch {
        operation: String,
        args: String,
        #[source]
        cause: Arc<HarborError>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Harbor API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarborError {
    /// Wrap a gateway failure with the cache key it was fetched under.
    /// The cause is shared because every caller coalesced onto the same
    /// fetch receives the same failure.
    pub fn remote_fetch(operation: impl Into<String>, args: impl Into<String>, cause: Arc<HarborError>) -> Self {
        HarborError::RemoteFetch {
            operation: operation.into(),
            args: args.into(),
            cause,
        }
    }
}
