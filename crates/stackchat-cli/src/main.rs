mod config;

use clap::{Parser, Subcommand};
use config::StackchatConfig;
use stackchat_agent::{ChatOrchestrator, ProviderKind, ProviderSelector};
use stackchat_core::CredentialResolver;
use stackchat_gateway::{AppState, GatewayServer, Sanitizer};
use stackchat_retrieval::{ContentstackClient, Retriever};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackchat", about = "stackchat — streaming chat gateway with Contentstack retrieval")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stackchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List providers, their default models and whether a key is configured
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env file");
        }
    }

    let cli = Cli::parse();

    let mut config = StackchatConfig::load(&cli.config).await?;
    config.apply_env(|name| std::env::var(name).ok())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            info!("Starting stackchat gateway on {}:{}", host, port);

            let content = Arc::new(ContentstackClient::new(&config.contentstack)?);
            let default_credentials = config.contentstack.default_credentials();
            if default_credentials.is_none() {
                info!("No default Contentstack credentials; requests must bring their own");
            }

            let selector = ProviderSelector::from_config(&config.providers)?;
            let orchestrator = ChatOrchestrator::new(
                Arc::new(Retriever::new(content.clone())),
                Arc::new(selector),
                CredentialResolver::new(default_credentials),
            );
            let state = AppState::new(
                Arc::new(orchestrator),
                content,
                Sanitizer::new(config.security.max_message_length),
            );
            let app = GatewayServer::build(state);

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("stackchat gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Providers => {
            println!("Providers (default: {}):", config.providers.default);
            for kind in ProviderKind::ALL {
                let provider = config.providers.get(kind);
                let key = if provider.has_api_key() { "configured" } else { "missing" };
                let fallback = kind
                    .fallback()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "  {:<7} model: {:<26} key: {:<10} fallback: {}",
                    kind.display_name(),
                    provider.default_model(kind),
                    key,
                    fallback
                );
                println!("          endpoint: {}", provider.base_url(kind));
            }
        }
    }

    Ok(())
}
