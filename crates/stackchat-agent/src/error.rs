use crate::config::ProviderKind;
use stackchat_core::StackchatError;

/// Vendor codes that mean the account is out of quota or being throttled.
const QUOTA_CODES: &[&str] = &[
    "rate_limit_exceeded",
    "insufficient_quota",
    "resource_exhausted",
    "rate_limited",
];

/// A failed vendor call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Vendor that failed.
    pub provider: ProviderKind,
    /// HTTP status, when the vendor answered.
    pub status: Option<u16>,
    /// Vendor error code such as `insufficient_quota`.
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ProviderError {
    /// An error with only a message.
    pub fn new(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Attaches an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a vendor error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builds an error from a non-success vendor response.
    ///
    /// Understands the `{"error": {"message", "code" | "type" | "status"}}`
    /// envelope shared by the OpenAI, Groq and Gemini APIs; anything else is
    /// kept verbatim as the message.
    pub fn from_response(provider: ProviderKind, status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));
        let mut err = Self::new(provider, response_message(provider, status, body, error)).with_status(status);
        err.code = error.and_then(error_code);
        err
    }

    /// Builds an error from an `error` object delivered inside a stream.
    pub fn from_stream_error(provider: ProviderKind, error: &serde_json::Value) -> Self {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let mut err = Self::new(provider, format!("{provider} stream error: {message}"));
        err.code = error_code(error);
        err.status = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        err
    }

    /// A connection-level failure.
    pub fn transport(provider: ProviderKind, err: &reqwest::Error) -> Self {
        let mut out = Self::new(provider, format!("{provider} request failed: {err}"));
        out.status = err.status().map(|s| s.as_u16());
        out
    }

    /// Whether this failure means the vendor account is out of quota or throttled.
    pub fn is_quota_or_rate_limit(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }
        if let Some(code) = &self.code {
            let code = code.to_ascii_lowercase();
            if QUOTA_CODES.contains(&code.as_str()) {
                return true;
            }
        }
        let lower = self.message.to_lowercase();
        lower.contains("quota") || lower.contains("rate limit") || lower.contains("rate_limit")
    }
}

fn response_message(
    provider: ProviderKind,
    status: u16,
    body: &str,
    error: Option<&serde_json::Value>,
) -> String {
    let detail = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.to_string()
            }
        });
    format!("{provider} API error {status}: {detail}")
}

fn error_code(error: &serde_json::Value) -> Option<String> {
    ["code", "type", "status"]
        .iter()
        .filter_map(|key| error.get(*key))
        .find_map(|v| v.as_str().map(str::to_string))
}

impl From<ProviderError> for StackchatError {
    fn from(err: ProviderError) -> Self {
        StackchatError::Provider(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_429_body() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = ProviderError::from_response(ProviderKind::OpenAi, 429, body);
        assert_eq!(err.status, Some(429));
        assert_eq!(err.code.as_deref(), Some("insufficient_quota"));
        assert!(err.message.contains("You exceeded your current quota"));
        assert!(err.message.starts_with("OpenAI API error 429"));
        assert!(err.is_quota_or_rate_limit());
    }

    #[test]
    fn test_gemini_status_code() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = ProviderError::from_response(ProviderKind::Gemini, 429, body);
        assert_eq!(err.code.as_deref(), Some("RESOURCE_EXHAUSTED"));
        assert!(err.is_quota_or_rate_limit());
    }

    #[test]
    fn test_code_alone_classifies() {
        let err = ProviderError::new(ProviderKind::Groq, "slow down").with_code("rate_limit_exceeded");
        assert!(err.is_quota_or_rate_limit());
    }

    #[test]
    fn test_message_alone_classifies() {
        let err = ProviderError::new(ProviderKind::Groq, "Rate limit reached for model");
        assert!(err.is_quota_or_rate_limit());
        let err = ProviderError::new(ProviderKind::Groq, "monthly QUOTA used up");
        assert!(err.is_quota_or_rate_limit());
    }

    #[test]
    fn test_other_errors_do_not_classify() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = ProviderError::from_response(ProviderKind::OpenAi, 401, body);
        assert!(!err.is_quota_or_rate_limit());
        assert_eq!(err.code.as_deref(), Some("invalid_api_key"));

        let err = ProviderError::from_response(ProviderKind::OpenAi, 500, "upstream exploded");
        assert!(!err.is_quota_or_rate_limit());
        assert!(err.message.ends_with("upstream exploded"));
    }

    #[test]
    fn test_stream_error_object() {
        let err = ProviderError::from_stream_error(
            ProviderKind::Groq,
            &serde_json::json!({"message": "Rate limit reached", "type": "tokens"}),
        );
        assert!(err.is_quota_or_rate_limit());
        assert_eq!(err.code.as_deref(), Some("tokens"));
    }

    #[test]
    fn test_converts_to_stackchat_error() {
        let err: StackchatError = ProviderError::new(ProviderKind::OpenAi, "boom").into();
        assert!(matches!(err, StackchatError::Provider(m) if m == "boom"));
    }
}
