//! mockwire - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use mockwire::{MockServer, MockServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mockwire",
    about = "Programmable HTTP stub server - register mocks at POST /mock/mapping",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mockwire.yaml")]
    config: PathBuf,

    /// Listen address, overrides the configuration file
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../config/default.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no mappings)");
        MockServerConfig::default()
    };

    if args.validate {
        println!(
            "Configuration is valid ({} mappings defined)",
            config.mappings.len()
        );
        return Ok(());
    }

    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let server = MockServer::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
