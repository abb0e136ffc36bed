use serde::{Deserialize, Serialize};

/// Name under which retrieval augmentation is announced to providers.
pub const CONTENT_SEARCH_TOOL: &str = "content_search";

/// A tool invocation attached to an assistant message.
///
/// `arguments` is the serialized JSON argument object, as vendor APIs expect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its result.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Serialized JSON arguments.
    pub arguments: String,
}

impl ToolCall {
    /// Serializes `arguments` into a call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

/// Output paired with a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers.
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    /// Result text handed to the model.
    pub content: String,
    /// True when `content` describes a failure.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result.
    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
