//! HTTP surface of stackchat: chat over Server-Sent Events or JSON, tours
//! search, entry lookup, credential validation and a health check.

/// `POST /chat/send`.
pub mod chat;
/// Tours search, entry lookup and stack validation.
pub mod content;
/// JSON error responses.
pub mod error;
/// Inbound message cleaning.
pub mod sanitizer;
/// Router and shared state.
pub mod server;

pub use chat::SendRequest;
pub use error::ApiError;
pub use sanitizer::Sanitizer;
pub use server::{AppState, GatewayServer, STACK_CONFIG_HEADER};
