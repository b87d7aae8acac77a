//! Lineside module binary.
//!
//! # Usage
//!
//! ```bash
//! # Run module MOD01 from ./lineside.toml
//! lineside-module MOD01
//!
//! # Explicit configuration file and verbose logging
//! lineside-module MOD01 --config /etc/lineside/railway.toml --log-level debug
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use lineside_server::{
    ConfigSource, Module, ModuleIdentity, StdoutConsole, SystemEnv, TcpConnector,
    TomlConfigSource,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Lineside outstation simulator
#[derive(Parser, Debug)]
#[command(name = "lineside-module")]
#[command(about = "Simulated lineside module for a remote interlocking")]
#[command(version)]
struct Args {
    /// Module identity (five characters from A-Z, 0-9 and _)
    identity: ModuleIdentity,

    /// Railway configuration file
    #[arg(short, long, default_value = "lineside.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Lineside module {} starting", args.identity);
    tracing::info!("Loading configuration from {}", args.config.display());

    let config = match TomlConfigSource::new(&args.config).load(&args.identity) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error, module {} not started: {}", args.identity, e);
            return Err(e.into());
        },
    };

    Module::new(config, SystemEnv::new(), TcpConnector, Arc::new(StdoutConsole)).run().await?;

    Ok(())
}
