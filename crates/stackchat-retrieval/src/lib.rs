//! Content retrieval for stackchat.
//!
//! Decides from a user message whether CMS content is needed, builds a filter
//! set, searches Contentstack, re-applies the filters locally and shapes the
//! survivors into a bounded text block for the model.

/// Contentstack delivery API client.
pub mod contentstack;
/// Filter extraction from user messages.
pub mod filters;
/// Content need and content type detection.
pub mod intent;
/// Classification, search and shaping in one call.
pub mod retriever;
/// Post-filtering and formatting of search results.
pub mod shaping;
/// The content source seam and its error type.
pub mod source;

pub use contentstack::{ContentstackClient, ContentstackConfig};
pub use filters::{build_filters, FilterSet, FilterValue};
pub use intent::{detect_content_type, needs_data, ContentType};
pub use retriever::{RetrievalOutcome, RetrievedContext, Retriever, GREETING, TIMEOUT_MARKER};
pub use shaping::{parse_tour_block, TourSummary};
pub use source::{ContentEntry, ContentSource, RetrievalError};
