use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pasteconf::PasteConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pastebin::{serve, telemetry};

/// Self-hosted pastebin backed by S3-compatible storage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to load in place of ./pastebin.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and PASTEBIN_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PASTEBIN_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = PasteConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.infra.bind.host = host;
    }
    if let Some(port) = cli.port {
        config.infra.bind.port = port;
    }

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    let telemetry = telemetry::init(&config.infra.telemetry)
        .context("Failed to initialize telemetry")?;

    info!(version = env!("CARGO_PKG_VERSION"), "pastebin starting");
    for path in &sources.files {
        info!(path = %path.display(), "loaded config file");
    }
    if !sources.env_overrides.is_empty() {
        info!(vars = ?sources.env_overrides, "environment overrides applied");
    }
    info!("effective configuration:\n{}", config.to_toml());

    let shutdown = CancellationToken::new();
    tokio::spawn(serve::shutdown_signal(shutdown.clone()));

    let result = serve::run(config, shutdown).await;
    telemetry.shutdown();
    result
}
