use super::types::HarborError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// The session keeps running and the error is shown as a notice.
    pub recoverable: bool,
}

impl HarborError {
    /// Classify this error to decide whether the session can carry on.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            HarborError::RemoteFetch { .. } => ErrorClassification {
                error_type: "RemoteFetchError",
                recoverable: true,
            },
            HarborError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                recoverable: true,
            },
            HarborError::Navigation(_) => ErrorClassification {
                error_type: "NavigationError",
                recoverable: true,
            },
            HarborError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationFailure",
                recoverable: true,
            },
            HarborError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                recoverable: true,
            },
            HarborError::Api { .. } => ErrorClassification {
                error_type: "ApiError",
                recoverable: true,
            },
            HarborError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                recoverable: true,
            },

            HarborError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                recoverable: false,
            },
            HarborError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                recoverable: false,
            },
            HarborError::Io(_) => ErrorClassification {
                error_type: "IoError",
                recoverable: false,
            },
            HarborError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                recoverable: false,
            },
        }
    }

    /// Process exit code used by the binary when a command fails.
    pub fn exit_code(&self) -> i32 {
        match self {
            HarborError::Config(_) | HarborError::Yaml(_) => 2,
            HarborError::Network(_) => 3,
            HarborError::Authentication(_) => 4,
            HarborError::RemoteFetch { cause, .. } => cause.exit_code(),
            _ => 1,
        }
    }
}
