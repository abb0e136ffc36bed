use crate::filters::{FilterSet, FilterValue};
use crate::source::{ContentEntry, ContentSource, RetrievalError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use stackchat_core::StackConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Contentstack delivery API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentstackConfig {
    /// Delivery API origin, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Process-wide default credentials, used when a request brings none.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Default delivery token.
    #[serde(default)]
    pub delivery_token: Option<String>,
    /// Default publishing environment.
    #[serde(default)]
    pub environment: Option<String>,
}

fn default_base_url() -> String {
    "https://cdn.contentstack.io".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ContentstackConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
            delivery_token: None,
            environment: None,
        }
    }
}

impl ContentstackConfig {
    /// The default credential set, present only when both key and token are set.
    pub fn default_credentials(&self) -> Option<StackConfig> {
        match (&self.api_key, &self.delivery_token) {
            (Some(key), Some(token)) if !key.is_empty() && !token.is_empty() => {
                Some(StackConfig::new(
                    key.clone(),
                    token.clone(),
                    self.environment
                        .clone()
                        .unwrap_or_else(|| "development".to_string()),
                ))
            }
            _ => None,
        }
    }
}

/// Delivery API client.
#[derive(Clone)]
pub struct ContentstackClient {
    base_url: String,
    http: reqwest::Client,
}

impl ContentstackClient {
    /// Builds a client with the configured base URL and per-request timeout.
    pub fn new(config: &ContentstackConfig) -> Result<Self, RetrievalError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn get(&self, path: &str, credentials: &StackConfig) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/v3{}", self.base_url, path))
            .header("api_key", &credentials.api_key)
            .header("access_token", &credentials.delivery_token)
            .query(&[("environment", credentials.environment.as_str())])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RetrievalError> {
        let resp = request.send().await.map_err(transport_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body["error_message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|e| RetrievalError::Decode(e.to_string()))
    }
}

/// Content type and entry uids are `[A-Za-z0-9_-]+`; anything else would
/// change the request path once placed in the URL.
fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout
    } else {
        RetrievalError::Transport(e.to_string())
    }
}

/// Translates a filter set into a delivery API `query` object.
///
/// Numbers are upper bounds and ingredient lists become a case-insensitive
/// alternation; the backend treats all of it loosely.
pub fn to_query(filters: &FilterSet) -> Value {
    let mut query = Map::new();
    for (field, value) in filters.iter() {
        let clause = match value {
            FilterValue::Text(text) => json!(text),
            FilterValue::Number(n) => json!({ "$lte": n }),
            FilterValue::List(items) => json!({
                "$regex": items.iter().map(|i| regex::escape(i)).collect::<Vec<_>>().join("|"),
                "$options": "i",
            }),
        };
        query.insert(field.clone(), clause);
    }
    Value::Object(query)
}

#[async_trait]
impl ContentSource for ContentstackClient {
    async fn search_entries(
        &self,
        content_type: &str,
        filters: &FilterSet,
        credentials: &StackConfig,
    ) -> Result<Vec<ContentEntry>, RetrievalError> {
        if !is_identifier(content_type) {
            return Err(RetrievalError::Decode(format!("invalid content type `{content_type}`")));
        }
        let mut request = self.get(&format!("/content_types/{content_type}/entries"), credentials);
        if !filters.is_empty() {
            request = request.query(&[("query", to_query(filters).to_string())]);
        }

        debug!(content_type, filters = filters.len(), "Searching Contentstack entries");
        let body = self.send(request).await.inspect_err(|e| {
            warn!(content_type, error = %e, "Contentstack search failed");
        })?;

        let entries = body["entries"]
            .as_array()
            .ok_or_else(|| RetrievalError::Decode("missing `entries` array".into()))?;
        Ok(entries.iter().cloned().map(ContentEntry::from).collect())
    }

    async fn get_entry(
        &self,
        content_type: &str,
        uid: &str,
        credentials: &StackConfig,
    ) -> Result<Option<ContentEntry>, RetrievalError> {
        if !is_identifier(content_type) || !is_identifier(uid) {
            debug!(content_type, uid, "Rejecting malformed entry identifier");
            return Ok(None);
        }
        let request = self.get(&format!("/content_types/{content_type}/entries/{uid}"), credentials);
        match self.send(request).await {
            Ok(body) => Ok(Some(ContentEntry::from(body["entry"].clone()))),
            Err(RetrievalError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn probe(&self, credentials: &StackConfig) -> Result<(), RetrievalError> {
        let request = self
            .get("/content_types", credentials)
            .query(&[("limit", "1")]);
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_translation() {
        let mut filters = FilterSet::new();
        filters.insert("country", FilterValue::Text("India".into()));
        filters.insert("price", FilterValue::Number(50_000));
        filters.insert(
            "ingredients",
            FilterValue::List(vec!["chicken".into(), "rice".into()]),
        );

        let query = to_query(&filters);
        assert_eq!(query["country"], "India");
        assert_eq!(query["price"]["$lte"], 50_000);
        assert_eq!(query["ingredients"]["$regex"], "chicken|rice");
        assert_eq!(query["ingredients"]["$options"], "i");
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("tour"));
        assert!(is_identifier("blt0a1b-c_2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("t1/../../content_types"));
        assert!(!is_identifier("t1?limit=100"));
        assert!(!is_identifier("t%2F1"));
    }

    #[test]
    fn test_default_credentials_require_key_and_token() {
        let mut config = ContentstackConfig::default();
        assert!(config.default_credentials().is_none());

        config.api_key = Some("blt".into());
        assert!(config.default_credentials().is_none());

        config.delivery_token = Some("cs".into());
        let creds = config.default_credentials().unwrap();
        assert_eq!(creds.environment, "development");
    }
}
