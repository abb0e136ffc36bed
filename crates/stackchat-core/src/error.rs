use thiserror::Error;

/// A convenience `Result` alias using [`StackchatError`].
pub type StackchatResult<T> = Result<T, StackchatError>;

/// Top-level error type for stackchat.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum StackchatError {
    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// Missing or incomplete CMS credentials.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// An error from the content retrieval pipeline.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// An error reported by a model provider.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        let err = StackchatError::Credentials("deliveryToken is required".into());
        assert_eq!(err.to_string(), "Credentials error: deliveryToken is required");

        let err = StackchatError::Provider("429 Too Many Requests".into());
        assert!(err.to_string().starts_with("Provider error:"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: StackchatError = parse.unwrap_err().into();
        assert!(matches!(err, StackchatError::Json(_)));
    }
}
