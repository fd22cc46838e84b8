use anyhow::Result;
use clap::Parser;
use handoff::common::config::{apply_overrides, load_config, ConfigOverrides, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Clap reads this struct and creates CLI
#[derive(Parser)]
#[command(name = "handoff")]
#[command(about = "Rendezvous file relay: upload to a key, download from the same key")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, help = "Path to TOML config file")]
    config: PathBuf,

    #[arg(long, help = "Listen port (overrides config)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handoff=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let config = apply_overrides(config, &ConfigOverrides { port: cli.port });
    tracing::info!(?config, "using configuration");

    handoff::server::run(config).await
}
