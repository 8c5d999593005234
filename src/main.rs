//! gridconf node.
//!
//! Runs as the master (owns the authoritative tree, accepts commits) or as a
//! replica (pulls newer snapshots and serves them, optionally to its own
//! sub-replicas).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use gridconf::config::{self, NodeRole, ServiceConfig};
use gridconf::lifecycle::startup;
use gridconf::observability::logging;

#[derive(Parser)]
#[command(name = "gridconf")]
#[command(about = "Versioned configuration service node", long_about = None)]
struct Cli {
    /// Path to the TOML service configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the role from the configuration file.
    #[arg(short, long, value_enum)]
    role: Option<Role>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Master,
    Replica,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(role) = cli.role {
        config.node.role = match role {
            Role::Master => NodeRole::Master,
            Role::Replica => NodeRole::Replica,
        };
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gridconf starting");

    startup::run(config).await?;
    Ok(())
}
