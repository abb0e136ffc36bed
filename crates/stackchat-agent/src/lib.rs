//! Provider adapters, provider selection and the streaming chat orchestrator.
//!
//! A chat turn flows through [`ChatOrchestrator`]: content retrieval and
//! augmentation, then a streamed completion from the selected
//! [`ProviderAdapter`], with one switch to the partner provider when the
//! first one is out of quota.

/// Adapters turning a backend into a cancellable token stream.
pub mod adapter;
/// Vendor HTTP backends.
pub mod backends;
/// Provider identities and settings.
pub mod config;
/// Vendor call failures.
pub mod error;
/// The chat turn state machine.
pub mod orchestrator;
/// Provider and model selection.
pub mod selector;
/// Client-facing chat events.
pub mod stream;

pub use adapter::{CompletionRequest, ProviderAdapter, StreamItem, TokenStream};
pub use backends::LlmBackend;
pub use config::{ProviderConfig, ProviderKind, ProvidersConfig};
pub use error::ProviderError;
pub use orchestrator::{ChatFailure, ChatOrchestrator, ChatRequest, FailureKind, Reply};
pub use selector::ProviderSelector;
pub use stream::ChatEvent;
