//! CLI entry point for the relay server.

use anyhow::Result;
use clap::Parser;
use ctrelay_core::RelayConfig;
use ctrelay_core::config::load_file_config;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Priority: CLI flags > environment > config file > defaults
    let mut config = RelayConfig::default();
    if let Some((path, file_config)) = load_file_config(args.config.as_deref())? {
        info!(path = %path.display(), "loaded config file");
        config.apply_file(&file_config);
    }
    config.apply_process_env()?;
    args.apply_to(&mut config);
    config.validate()?;

    debug!(?config, "effective configuration");
    ctrelay_core::serve(config).await
}
