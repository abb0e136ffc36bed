use crate::filters::FilterSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stackchat_core::StackConfig;
use thiserror::Error;

/// Failure talking to the content service.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The request exceeded the configured timeout.
    #[error("content service timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("content service request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status with the CMS error message.
    #[error("content service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `error_message` from the body, or the raw body.
        message: String,
    },

    /// The body was not the expected JSON shape.
    #[error("unexpected content service response: {0}")]
    Decode(String),
}

impl RetrievalError {
    /// True for [`RetrievalError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetrievalError::Timeout)
    }
}

/// One CMS entry as returned by the delivery API.
///
/// Entries are kept as raw JSON objects: the search backend is schemaless from
/// our side and fields may be missing or carry unexpected types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentEntry(pub Map<String, Value>);

impl ContentEntry {
    /// Raw JSON value of `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Renders a field as display text. Strings as-is, numbers in JSON form,
    /// string arrays joined by ", ", anything else empty.
    pub fn text(&self, field: &str) -> String {
        match self.0.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        }
    }

    /// First non-empty text among the given fields.
    pub fn text_or(&self, fields: &[&str]) -> String {
        fields
            .iter()
            .map(|f| self.text(f))
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    /// The price when it is a JSON number; any other type does not count.
    pub fn price(&self) -> Option<f64> {
        match self.0.get("price") {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// `url` as a plain string or as a link object's `href`.
    pub fn url(&self) -> String {
        match self.0.get("url") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(link)) => link
                .get("href")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }
}

impl From<Value> for ContentEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// The remote content search service.
///
/// Implementations must treat filters as suggestions at best; callers
/// re-apply the constraints they care about.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Searches entries of `content_type` matching `filters`.
    async fn search_entries(
        &self,
        content_type: &str,
        filters: &FilterSet,
        credentials: &StackConfig,
    ) -> Result<Vec<ContentEntry>, RetrievalError>;

    /// Fetches a single entry by uid. `Ok(None)` when it does not exist.
    async fn get_entry(
        &self,
        content_type: &str,
        uid: &str,
        credentials: &StackConfig,
    ) -> Result<Option<ContentEntry>, RetrievalError>;

    /// One read-only call proving the credentials work.
    async fn probe(&self, credentials: &StackConfig) -> Result<(), RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_rendering() {
        let entry = ContentEntry::from(json!({
            "title": "Goa Beach Escape",
            "price": 45000,
            "tags": ["beach", "sun"],
            "nested": {"a": 1}
        }));
        assert_eq!(entry.text("title"), "Goa Beach Escape");
        assert_eq!(entry.text("price"), "45000");
        assert_eq!(entry.text("tags"), "beach, sun");
        assert_eq!(entry.text("nested"), "");
        assert_eq!(entry.text("missing"), "");
    }

    #[test]
    fn test_price_requires_number() {
        assert_eq!(ContentEntry::from(json!({"price": 100})).price(), Some(100.0));
        assert_eq!(ContentEntry::from(json!({"price": "100"})).price(), None);
        assert_eq!(ContentEntry::from(json!({})).price(), None);
    }

    #[test]
    fn test_url_forms() {
        assert_eq!(ContentEntry::from(json!({"url": "/tours/goa"})).url(), "/tours/goa");
        assert_eq!(
            ContentEntry::from(json!({"url": {"title": "x", "href": "/tours/rome"}})).url(),
            "/tours/rome"
        );
        assert_eq!(ContentEntry::from(json!({"url": 3})).url(), "");
    }

    #[test]
    fn test_text_or_fallback() {
        let entry = ContentEntry::from(json!({"highlights": "", "multi_line": "Sunsets"}));
        assert_eq!(entry.text_or(&["highlights", "multi_line"]), "Sunsets");
    }
}
