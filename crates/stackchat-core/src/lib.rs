//! Core types and error definitions for the stackchat gateway.
//!
//! This crate provides the foundational types shared across all stackchat
//! crates: the unified error enum, conversation messages, the synthetic tool
//! call types used for retrieval augmentation, and the per-request CMS
//! credential bundle.
//!
//! # Main types
//!
//! - [`StackchatError`] — Unified error enum for all stackchat subsystems.
//! - [`StackchatResult`] — Convenience alias for `Result<T, StackchatError>`.
//! - [`Role`] — Message role (user, assistant, system, tool).
//! - [`Message`] — A single message within a conversation.
//! - [`ToolCall`] — A tool invocation announced on behalf of the assistant.
//! - [`ToolResult`] — The content paired with a [`ToolCall`].
//! - [`StackConfig`] — Contentstack credentials supplied for one request.

/// Per-request CMS credentials and their resolution order.
pub mod credentials;
/// Unified error type.
pub mod error;
/// Conversation messages.
pub mod message;
/// Tool call and tool result types.
pub mod tool;

pub use credentials::{CredentialResolver, CredentialSource, StackConfig, MISSING_CREDENTIALS};
pub use error::{StackchatError, StackchatResult};
pub use message::{latest_user_message, Message, Role};
pub use tool::{ToolCall, ToolResult, CONTENT_SEARCH_TOOL};
