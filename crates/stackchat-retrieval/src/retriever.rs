use crate::filters::{build_filters, FilterSet};
use crate::intent::{detect_content_type, needs_data, ContentType};
use crate::shaping::{post_filter, summarize};
use crate::source::{ContentSource, RetrievalError};
use stackchat_core::{StackConfig, StackchatError, StackchatResult, MISSING_CREDENTIALS};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Canned reply used when a message needs no CMS content.
pub const GREETING: &str =
    "Hello! How can I help you today? You can ask about tours, prices, or destinations.";

/// Marker content for a search that timed out.
pub const TIMEOUT_MARKER: &str = "__TIMEOUT__";

/// Shaped retrieval output for one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    /// Content type that was searched.
    pub content_type: ContentType,
    /// Filters sent with the search.
    pub filters: FilterSet,
    /// Shaped results or a failure marker.
    pub content: String,
    /// True when `content` is a failure marker rather than search results.
    pub is_error: bool,
}

/// Result of classifying and (possibly) fetching for a message.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    /// No content needed; the canned greeting. No remote call was made.
    Greeting(String),
    /// Content to inject into the conversation.
    Context(RetrievedContext),
}

/// Intent-driven content retriever.
pub struct Retriever {
    source: Arc<dyn ContentSource>,
}

impl Retriever {
    /// Creates a retriever over `source`.
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// The underlying content source.
    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Classifies `user_message`, searches when needed and shapes the results.
    ///
    /// Transport failures come back as marker content; the only error is a
    /// message that needs data while no credentials are available.
    pub async fn classify_and_fetch(
        &self,
        user_message: &str,
        credentials: Option<&StackConfig>,
    ) -> StackchatResult<RetrievalOutcome> {
        debug!(message_len = user_message.len(), "Classifying user message");

        if !needs_data(user_message) {
            info!("No data query detected, answering with greeting");
            return Ok(RetrievalOutcome::Greeting(GREETING.to_string()));
        }

        let credentials = credentials
            .ok_or_else(|| StackchatError::Credentials(MISSING_CREDENTIALS.to_string()))?;

        let content_type = detect_content_type(user_message);
        let filters = build_filters(user_message);
        info!(%content_type, filters = ?filters, "Fetching content");

        let entries = match self
            .source
            .search_entries(content_type.as_str(), &filters, credentials)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(%content_type, error = %e, "Content search failed");
                return Ok(RetrievalOutcome::Context(RetrievedContext {
                    content_type,
                    filters,
                    content: failure_marker(&e),
                    is_error: true,
                }));
            }
        };

        let fetched = entries.len();
        let survivors = post_filter(content_type, &filters, entries);
        info!(fetched, kept = survivors.len(), "Content search complete");

        Ok(RetrievalOutcome::Context(RetrievedContext {
            content: summarize(content_type, &survivors),
            content_type,
            filters,
            is_error: false,
        }))
    }
}

fn failure_marker(err: &RetrievalError) -> String {
    if err.is_timeout() {
        TIMEOUT_MARKER.to_string()
    } else {
        format!("Content search failed: {err}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::ContentEntry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A content source that returns a fixed result and counts calls.
    struct StaticSource {
        result: fn() -> Result<Vec<ContentEntry>, RetrievalError>,
        calls: AtomicU32,
    }

    impl StaticSource {
        fn new(result: fn() -> Result<Vec<ContentEntry>, RetrievalError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for StaticSource {
        async fn search_entries(
            &self,
            _content_type: &str,
            _filters: &FilterSet,
            _credentials: &StackConfig,
        ) -> Result<Vec<ContentEntry>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        async fn get_entry(
            &self,
            _content_type: &str,
            _uid: &str,
            _credentials: &StackConfig,
        ) -> Result<Option<ContentEntry>, RetrievalError> {
            Ok(None)
        }

        async fn probe(&self, _credentials: &StackConfig) -> Result<(), RetrievalError> {
            Ok(())
        }
    }

    fn creds() -> StackConfig {
        StackConfig::new("blt", "cs", "development")
    }

    fn india_tours() -> Result<Vec<ContentEntry>, RetrievalError> {
        Ok(vec![
            ContentEntry::from(json!({"title": "Goa Escape", "city": "Goa", "country": "India", "price": 45000})),
            ContentEntry::from(json!({"title": "Kerala Luxe", "city": "Kochi", "country": "India", "price": 95000})),
        ])
    }

    #[tokio::test]
    async fn test_greeting_makes_no_remote_call() {
        let source = StaticSource::new(india_tours);
        let retriever = Retriever::new(source.clone());

        let outcome = retriever.classify_and_fetch("Hello there!", None).await.unwrap();
        assert_eq!(outcome, RetrievalOutcome::Greeting(GREETING.to_string()));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_an_error() {
        let source = StaticSource::new(india_tours);
        let retriever = Retriever::new(source.clone());

        let err = retriever.classify_and_fetch("tours in India", None).await.unwrap_err();
        assert!(matches!(err, StackchatError::Credentials(_)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_context_is_post_filtered_and_shaped() {
        let retriever = Retriever::new(StaticSource::new(india_tours));
        let outcome = retriever
            .classify_and_fetch("Show me tours under ₹50,000 in India", Some(&creds()))
            .await
            .unwrap();

        let RetrievalOutcome::Context(ctx) = outcome else {
            panic!("expected context");
        };
        assert_eq!(ctx.content_type, ContentType::Tour);
        assert!(!ctx.is_error);
        assert!(ctx.content.contains("Goa Escape"));
        assert!(!ctx.content.contains("Kerala Luxe"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_marker() {
        let retriever = Retriever::new(StaticSource::new(|| Err(RetrievalError::Timeout)));
        let outcome = retriever
            .classify_and_fetch("tours in Italy", Some(&creds()))
            .await
            .unwrap();
        let RetrievalOutcome::Context(ctx) = outcome else {
            panic!("expected context");
        };
        assert!(ctx.is_error);
        assert_eq!(ctx.content, TIMEOUT_MARKER);
    }

    #[tokio::test]
    async fn test_other_failure_is_descriptive() {
        let retriever = Retriever::new(StaticSource::new(|| {
            Err(RetrievalError::Status {
                status: 401,
                message: "Bad api key".into(),
            })
        }));
        let outcome = retriever
            .classify_and_fetch("tours in Italy", Some(&creds()))
            .await
            .unwrap();
        let RetrievalOutcome::Context(ctx) = outcome else {
            panic!("expected context");
        };
        assert!(ctx.is_error);
        assert!(ctx.content.starts_with("Content search failed"));
        assert!(ctx.content.contains("Bad api key"));
    }

    #[tokio::test]
    async fn test_no_survivors_is_explicit() {
        let retriever = Retriever::new(StaticSource::new(|| Ok(vec![])));
        let outcome = retriever
            .classify_and_fetch("recipe with pasta", Some(&creds()))
            .await
            .unwrap();
        let RetrievalOutcome::Context(ctx) = outcome else {
            panic!("expected context");
        };
        assert_eq!(ctx.content_type, ContentType::Recipe);
        assert_eq!(ctx.content, crate::shaping::NO_RESULTS);
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let retriever = Retriever::new(StaticSource::new(india_tours));
        let a = retriever
            .classify_and_fetch("tours in India", Some(&creds()))
            .await
            .unwrap();
        let b = retriever
            .classify_and_fetch("tours in India", Some(&creds()))
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
