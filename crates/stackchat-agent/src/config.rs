use serde::{Deserialize, Serialize};
use std::fmt;

/// The LLM vendors a chat turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
    /// Google Gemini.
    Gemini,
}

impl ProviderKind {
    /// Every known vendor, in display order.
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Groq, ProviderKind::Gemini];

    /// Parses a client-supplied provider name, ignoring case and surrounding space.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Human-readable vendor name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Groq => "Groq",
            Self::Gemini => "Gemini",
        }
    }

    /// The partner a quota-exhausted turn may switch to.
    pub fn fallback(self) -> Option<Self> {
        match self {
            Self::OpenAi => Some(Self::Groq),
            Self::Groq => Some(Self::OpenAi),
            Self::Gemini => None,
        }
    }

    /// Model used when a request names none.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.1-8b-instant",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    /// Public API origin.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Groq => "https://api.groq.com/openai",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Environment variable holding the vendor's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Whether `model` already belongs to this vendor's namespace.
    pub fn owns_model(self, model: &str) -> bool {
        let model = model.to_ascii_lowercase();
        let prefixes: &[&str] = match self {
            Self::OpenAi => &["gpt-", "chatgpt-", "o1", "o3", "o4"],
            Self::Groq => &["llama", "meta-llama/", "mixtral", "gemma", "qwen", "deepseek"],
            Self::Gemini => &["gemini-"],
        };
        prefixes.iter().any(|p| model.starts_with(p))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Per-vendor settings. Unset fields fall back to the vendor defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key; the environment variable wins over this.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API origin override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override for requests that name none.
    #[serde(default)]
    pub default_model: Option<String>,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Configured origin or the vendor default, without a trailing slash.
    pub fn base_url(&self, kind: ProviderKind) -> &str {
        match &self.base_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/'),
            _ => kind.default_base_url(),
        }
    }

    /// Configured default model or the vendor default.
    pub fn default_model(&self, kind: ProviderKind) -> &str {
        match &self.default_model {
            Some(model) if !model.is_empty() => model,
            _ => kind.default_model(),
        }
    }

    /// The key, empty when unset.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// True when a non-empty key is set.
    pub fn has_api_key(&self) -> bool {
        !self.api_key().is_empty()
    }
}

/// The `[providers]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Vendor used when a request names none or an unknown one.
    #[serde(default = "default_provider")]
    pub default: ProviderKind,
    /// OpenAI settings.
    #[serde(default)]
    pub openai: ProviderConfig,
    /// Groq settings.
    #[serde(default)]
    pub groq: ProviderConfig,
    /// Gemini settings.
    #[serde(default)]
    pub gemini: ProviderConfig,
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            openai: ProviderConfig::default(),
            groq: ProviderConfig::default(),
            gemini: ProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    /// Settings for `kind`.
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    /// Mutable settings for `kind`.
    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Groq => &mut self.groq,
            ProviderKind::Gemini => &mut self.gemini,
        }
    }
}
