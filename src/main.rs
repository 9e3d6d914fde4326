//! switchyard - health-aware request routing for a local/remote LLM pair
//!
//! CLI entry point: one-shot requests through the router, config
//! validation, and provider connectivity probing.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchyard::config::{ApiKey, REMOTE_KEY_ENV_VAR};
use switchyard::{Config, RequestContext, RequestRouter};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Health-aware request routing between a local and a remote LLM provider")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a one-shot prompt through the router
    Ask {
        /// Prompt text
        prompt: String,

        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Task hint (e.g. code_review, complex_analysis)
        #[arg(long)]
        task_hint: Option<String>,

        /// Force the remote provider
        #[arg(long)]
        force_remote: bool,

        /// Completion token budget
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Probe both providers and print a connectivity report
    Probe {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

/// Load config from file when present, otherwise fall back to defaults plus
/// the convention env var for the remote key.
fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        let (config, key_source) = Config::from_file_with_env(path)?;
        tracing::info!(config = %path, key_source = %key_source, "Loaded configuration");
        Ok(config)
    } else {
        tracing::info!(config = %path, "Config file not found, using defaults");
        let mut config = Config::default();
        if let Ok(key) = std::env::var(REMOTE_KEY_ENV_VAR) {
            config.remote.api_key = Some(ApiKey::from(key));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            prompt,
            config,
            task_hint,
            force_remote,
            max_tokens,
        } => {
            let config = load_config(&config)?;
            let router = RequestRouter::connect(config).await?;

            let ctx = RequestContext {
                messages: vec![switchyard::ChatMessage::user(prompt)],
                task_hint,
                force_remote,
                max_tokens,
            };

            let response = router.complete(ctx).await?;
            println!("{}", response.text);
            tracing::info!(
                provider = %response.provider,
                reason = %response.routing_reason,
                fallback_used = response.fallback_used,
                latency_ms = response.latency_ms,
                "request served"
            );
            Ok(())
        }

        Commands::Check { config } => {
            let (parsed, key_source) = Config::from_file_with_env(&config)?;
            println!("Configuration OK");
            println!("  primary provider:  {}", parsed.router.primary);
            println!("  fallback enabled:  {}", parsed.router.fallback_enabled);
            println!("  local endpoint:    {}", parsed.local.url);
            println!("  remote endpoint:   {}", parsed.remote.url);
            println!("  remote key source: {}", key_source);
            Ok(())
        }

        Commands::Probe { config } => {
            let config = load_config(&config)?;
            let router = RequestRouter::connect(config).await?;

            let report = router.test_providers().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
