use serde::{Deserialize, Serialize};

/// Events emitted to the client during a chat turn.
///
/// Every turn ends with exactly one terminal event, either [`ChatEvent::Done`]
/// or [`ChatEvent::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Retrieved CMS content injected into the conversation.
    ToolCall {
        /// Shaped search results or a failure marker.
        content: String,
    },
    /// An incremental text fragment. Fragments concatenate into the reply.
    Token {
        /// Text fragment.
        token: String,
    },
    /// The turn moved to the fallback provider.
    ProviderSwitch {
        /// Provider that failed.
        from: String,
        /// Provider taking over.
        to: String,
        /// Error that triggered the switch.
        reason: String,
    },
    /// The turn failed. Terminal.
    Error {
        /// Error description.
        error: String,
        /// Provider that failed, when a provider was involved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    /// The reply is complete. Terminal.
    Done {},
}

impl ChatEvent {
    /// A `token` event.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token { token: token.into() }
    }

    /// An `error` event.
    pub fn error(error: impl Into<String>, provider: Option<String>) -> Self {
        Self::Error {
            error: error.into(),
            provider,
        }
    }

    /// The SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::Token { .. } => "token",
            Self::ProviderSwitch { .. } => "provider_switch",
            Self::Error { .. } => "error",
            Self::Done {} => "done",
        }
    }

    /// The JSON payload carried in the SSE `data` field.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::ToolCall { content } => serde_json::json!({ "content": content }),
            Self::Token { token } => serde_json::json!({ "token": token }),
            Self::ProviderSwitch { from, to, reason } => {
                serde_json::json!({ "from": from, "to": to, "reason": reason })
            }
            Self::Error { error, provider } => match provider {
                Some(p) => serde_json::json!({ "error": error, "provider": p }),
                None => serde_json::json!({ "error": error }),
            },
            Self::Done {} => serde_json::json!({}),
        }
    }

    /// True for `done` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done {} | Self::Error { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_payloads() {
        let ev = ChatEvent::ProviderSwitch {
            from: "OpenAI".into(),
            to: "Groq".into(),
            reason: "quota".into(),
        };
        assert_eq!(ev.name(), "provider_switch");
        assert_eq!(ev.data()["to"], "Groq");

        assert_eq!(ChatEvent::token("Hi").data(), serde_json::json!({"token": "Hi"}));
        assert_eq!(ChatEvent::Done {}.data(), serde_json::json!({}));
        assert_eq!(
            ChatEvent::error("boom", None).data(),
            serde_json::json!({"error": "boom"})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(ChatEvent::Done {}.is_terminal());
        assert!(ChatEvent::error("x", Some("Groq".into())).is_terminal());
        assert!(!ChatEvent::token("x").is_terminal());
        assert!(!ChatEvent::ToolCall { content: "x".into() }.is_terminal());
    }

    #[test]
    fn test_tagged_serialization_matches_wire_payload() {
        let ev = ChatEvent::error("quota", Some("OpenAI".into()));
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], ev.name());
        assert_eq!(v["data"], ev.data());

        let back: ChatEvent = serde_json::from_value(v).unwrap();
        assert_eq!(back, ev);
    }
}
