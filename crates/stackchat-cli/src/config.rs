use serde::Deserialize;
use stackchat_agent::{ProviderKind, ProvidersConfig};
use stackchat_retrieval::ContentstackConfig;
use std::path::Path;

/// Contents of `stackchat.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct StackchatConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub contentstack: ContentstackConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_max_msg_len")]
    pub max_message_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_msg_len(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_msg_len() -> usize {
    100_000
}

impl StackchatConfig {
    /// Reads the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {e}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())),
        }
    }

    /// Applies environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for kind in ProviderKind::ALL {
            if let Some(key) = var(kind.api_key_env()) {
                self.providers.get_mut(kind).api_key = Some(key);
            }
        }
        if let Some(key) = var("CONTENTSTACK_STACK_API_KEY") {
            self.contentstack.api_key = Some(key);
        }
        if let Some(token) = var("CONTENTSTACK_DELIVERY_TOKEN") {
            self.contentstack.delivery_token = Some(token);
        }
        if let Some(env) = var("CONTENTSTACK_ENVIRONMENT") {
            self.contentstack.environment = Some(env);
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{port}': {e}"))?;
        }
        Ok(())
    }
}
