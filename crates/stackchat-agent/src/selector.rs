use crate::adapter::ProviderAdapter;
use crate::backends::{GeminiBackend, OpenAiBackend};
use crate::config::{ProviderKind, ProvidersConfig};
use stackchat_core::{StackchatError, StackchatResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Known equivalents across vendors: `(model, target, equivalent)`.
const MODEL_MAP: &[(&str, ProviderKind, &str)] = &[
    ("gpt-4o-mini", ProviderKind::Groq, "llama-3.1-8b-instant"),
    ("gpt-4o", ProviderKind::Groq, "llama-3.3-70b-versatile"),
    ("gpt-4-turbo", ProviderKind::Groq, "llama-3.3-70b-versatile"),
    ("gpt-4", ProviderKind::Groq, "llama-3.3-70b-versatile"),
    ("gpt-3.5-turbo", ProviderKind::Groq, "llama-3.1-8b-instant"),
    ("gpt-4o-mini", ProviderKind::Gemini, "gemini-1.5-flash"),
    ("gpt-4o", ProviderKind::Gemini, "gemini-1.5-pro"),
    ("gpt-3.5-turbo", ProviderKind::Gemini, "gemini-1.5-flash"),
    ("llama-3.1-8b-instant", ProviderKind::OpenAi, "gpt-4o-mini"),
    ("llama-3.3-70b-versatile", ProviderKind::OpenAi, "gpt-4o"),
    ("llama-3.1-70b-versatile", ProviderKind::OpenAi, "gpt-4o"),
    ("mixtral-8x7b-32768", ProviderKind::OpenAi, "gpt-4o-mini"),
    ("gemma2-9b-it", ProviderKind::OpenAi, "gpt-4o-mini"),
    ("llama-3.1-8b-instant", ProviderKind::Gemini, "gemini-1.5-flash"),
    ("llama-3.3-70b-versatile", ProviderKind::Gemini, "gemini-1.5-pro"),
    ("gemini-1.5-flash", ProviderKind::OpenAi, "gpt-4o-mini"),
    ("gemini-1.5-pro", ProviderKind::OpenAi, "gpt-4o"),
    ("gemini-1.5-flash", ProviderKind::Groq, "llama-3.1-8b-instant"),
    ("gemini-1.5-pro", ProviderKind::Groq, "llama-3.3-70b-versatile"),
];

/// Picks the adapter for a request and translates model names between vendors.
pub struct ProviderSelector {
    adapters: HashMap<ProviderKind, ProviderAdapter>,
    default: ProviderAdapter,
    default_models: HashMap<ProviderKind, String>,
}

impl ProviderSelector {
    /// Builds a selector from explicit adapters. `default` must be among them.
    pub fn new(default: ProviderKind, adapters: Vec<ProviderAdapter>) -> StackchatResult<Self> {
        let adapters: HashMap<_, _> = adapters.into_iter().map(|a| (a.kind(), a)).collect();
        let default = adapters.get(&default).cloned().ok_or_else(|| {
            StackchatError::Config(format!("default provider {default} is not configured"))
        })?;
        let default_models = ProviderKind::ALL
            .iter()
            .map(|k| (*k, k.default_model().to_string()))
            .collect();
        Ok(Self {
            adapters,
            default,
            default_models,
        })
    }

    /// Builds an adapter for every vendor from the `[providers]` table.
    pub fn from_config(config: &ProvidersConfig) -> StackchatResult<Self> {
        let mut adapters = Vec::with_capacity(ProviderKind::ALL.len());
        for kind in ProviderKind::ALL {
            let cfg = config.get(kind);
            if !cfg.has_api_key() {
                warn!(provider = %kind, env = kind.api_key_env(), "No API key configured");
            }
            let adapter = match kind {
                ProviderKind::OpenAi | ProviderKind::Groq => {
                    ProviderAdapter::new(kind, Arc::new(OpenAiBackend::new(kind, cfg)?))
                }
                ProviderKind::Gemini => ProviderAdapter::new(kind, Arc::new(GeminiBackend::new(cfg)?)),
            };
            adapters.push(adapter);
        }

        let mut selector = Self::new(config.default, adapters)?;
        for kind in ProviderKind::ALL {
            selector = selector.with_default_model(kind, config.get(kind).default_model(kind));
        }
        info!(default = %config.default, "Provider selector ready");
        Ok(selector)
    }

    /// Overrides the default model for `kind`.
    pub fn with_default_model(mut self, kind: ProviderKind, model: impl Into<String>) -> Self {
        self.default_models.insert(kind, model.into());
        self
    }

    /// Kind of the default adapter.
    pub fn default_kind(&self) -> ProviderKind {
        self.default.kind()
    }

    /// The configured adapters in a stable order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }

    /// Model used for `kind` when a request names none.
    pub fn default_model(&self, kind: ProviderKind) -> &str {
        self.default_models
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_model())
    }

    /// The adapter for a client-supplied provider name. Unknown, absent or
    /// unconfigured names get the default adapter.
    pub fn resolve(&self, name: Option<&str>) -> &ProviderAdapter {
        name.and_then(ProviderKind::parse)
            .and_then(|kind| self.adapters.get(&kind))
            .unwrap_or(&self.default)
    }

    /// The fallback partner of `kind`, if it has one and it is configured.
    pub fn resolve_fallback(&self, kind: ProviderKind) -> Option<&ProviderAdapter> {
        kind.fallback().and_then(|partner| self.adapters.get(&partner))
    }

    /// Translates `model` into `target`'s namespace.
    ///
    /// A name the target already owns passes through; a known equivalent is
    /// looked up; anything else gets the target's default model.
    pub fn map_model(&self, model: Option<&str>, target: ProviderKind) -> String {
        let model = model.map(str::trim).filter(|m| !m.is_empty());
        let Some(model) = model else {
            return self.default_model(target).to_string();
        };
        if target.owns_model(model) {
            return model.to_string();
        }
        MODEL_MAP
            .iter()
            .find(|(name, kind, _)| *kind == target && name.eq_ignore_ascii_case(model))
            .map(|(_, _, mapped)| mapped.to_string())
            .unwrap_or_else(|| self.default_model(target).to_string())
    }
}
