use crate::error::{StackchatError, StackchatResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message surfaced to callers when no credential set can be resolved.
pub const MISSING_CREDENTIALS: &str =
    "Missing Contentstack credentials. Provide stackApiKey, deliveryToken and environment.";

fn default_environment() -> String {
    "development".to_string()
}

/// Contentstack credentials for a single request.
///
/// Field names follow the JSON shape sent by chat clients, both in the request
/// body and in the `x-stack-config` header.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack API key.
    #[serde(rename = "stackApiKey", alias = "apiKey", default)]
    pub api_key: String,
    /// Delivery token for the environment.
    #[serde(rename = "deliveryToken", default)]
    pub delivery_token: String,
    /// Publishing environment, `development` when omitted.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl StackConfig {
    /// Builds a credential set from its three parts.
    pub fn new(
        api_key: impl Into<String>,
        delivery_token: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            delivery_token: delivery_token.into(),
            environment: environment.into(),
        }
    }

    /// Checks that every field needed for a delivery API call is present.
    pub fn validate(&self) -> StackchatResult<()> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("stackApiKey");
        }
        if self.delivery_token.trim().is_empty() {
            missing.push("deliveryToken");
        }
        if self.environment.trim().is_empty() {
            missing.push("environment");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StackchatError::Credentials(format!(
                "Invalid Contentstack credentials: missing {}",
                missing.join(", ")
            )))
        }
    }
}

// Tokens never reach the logs.
impl fmt::Debug for StackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackConfig")
            .field("api_key", &redact(&self.api_key))
            .field("delivery_token", &redact(&self.delivery_token))
            .field("environment", &self.environment)
            .finish()
    }
}

fn redact(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("{}***", value.chars().take(4).collect::<String>())
    }
}

/// Where a resolved [`StackConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The `stackConfig` field of the request body.
    Request,
    /// The `x-stack-config` request header.
    Header,
    /// The process-wide default loaded at startup.
    Default,
}

/// Resolves the credentials for a request.
///
/// Order: request body → request header → process default → error. A
/// credential set that is supplied but incomplete is an error; it never falls
/// through to the next source.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    default: Option<StackConfig>,
}

impl CredentialResolver {
    /// Creates a resolver with an optional process default.
    pub fn new(default: Option<StackConfig>) -> Self {
        Self { default }
    }

    /// True when a process default is configured.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Picks the first supplied source and validates it.
    pub fn resolve(
        &self,
        from_request: Option<&StackConfig>,
        from_header: Option<&StackConfig>,
    ) -> StackchatResult<(StackConfig, CredentialSource)> {
        let candidate = from_request
            .map(|c| (c, CredentialSource::Request))
            .or_else(|| from_header.map(|c| (c, CredentialSource::Header)))
            .or_else(|| self.default.as_ref().map(|c| (c, CredentialSource::Default)));

        match candidate {
            Some((config, source)) => {
                config.validate()?;
                Ok((config.clone(), source))
            }
            None => Err(StackchatError::Credentials(MISSING_CREDENTIALS.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn full() -> StackConfig {
        StackConfig::new("blt123", "cs456", "production")
    }

    #[test]
    fn test_deserialize_client_shape() {
        let cfg: StackConfig = serde_json::from_str(
            r#"{"stackApiKey":"blt1","deliveryToken":"cs1","environment":"preview"}"#,
        )
        .unwrap();
        assert_eq!(cfg.api_key, "blt1");
        assert_eq!(cfg.delivery_token, "cs1");
        assert_eq!(cfg.environment, "preview");
    }

    #[test]
    fn test_environment_defaults_to_development() {
        let cfg: StackConfig =
            serde_json::from_str(r#"{"stackApiKey":"blt1","deliveryToken":"cs1"}"#).unwrap();
        assert_eq!(cfg.environment, "development");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_delivery_token_is_invalid() {
        let cfg: StackConfig = serde_json::from_str(r#"{"stackApiKey":"blt1"}"#).unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("deliveryToken"), "{err}");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", StackConfig::new("bltsecretkey", "cssecret", "dev"));
        assert!(!rendered.contains("secretkey"));
        assert!(!rendered.contains("cssecret"));
        assert!(rendered.contains("dev"));
    }

    #[test]
    fn test_resolution_order() {
        let resolver = CredentialResolver::new(Some(StackConfig::new("default", "tok", "dev")));
        let header = StackConfig::new("header", "tok", "dev");

        let (cfg, source) = resolver.resolve(Some(&full()), Some(&header)).unwrap();
        assert_eq!(cfg.api_key, "blt123");
        assert_eq!(source, CredentialSource::Request);

        let (cfg, source) = resolver.resolve(None, Some(&header)).unwrap();
        assert_eq!(cfg.api_key, "header");
        assert_eq!(source, CredentialSource::Header);

        let (cfg, source) = resolver.resolve(None, None).unwrap();
        assert_eq!(cfg.api_key, "default");
        assert_eq!(source, CredentialSource::Default);
    }

    #[test]
    fn test_incomplete_request_config_does_not_fall_back() {
        let resolver = CredentialResolver::new(Some(full()));
        let partial = StackConfig::new("blt", "", "dev");
        assert!(resolver.resolve(Some(&partial), None).is_err());
    }

    #[test]
    fn test_nothing_configured_is_missing_credentials() {
        let resolver = CredentialResolver::default();
        let err = resolver.resolve(None, None).unwrap_err();
        assert!(matches!(err, StackchatError::Credentials(_)));
        assert!(err.to_string().contains("Missing Contentstack credentials"));
    }
}
