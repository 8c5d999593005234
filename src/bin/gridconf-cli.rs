use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use gridconf::client::{ConfigClient, HttpConfigClient};
use gridconf::store::{CommitMode, Version};
use gridconf::tree::codec::{decode_snapshot, encode_snapshot};
use gridconf::tree::ConfigTree;

#[derive(Parser)]
#[command(name = "gridconf-cli")]
#[command(about = "Operator CLI for gridconf nodes", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9135")]
    url: String,

    /// Bearer token, required for commit, rollback and refresh.
    #[arg(short, long, env = "GRIDCONF_TOKEN")]
    token: Option<String>,

    /// Per-call timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node's current version
    Version,
    /// Print the node's current tree
    Show,
    /// Commit a tree file to the master
    Commit {
        file: PathBuf,
        /// Merge over the current tree instead of replacing it
        #[arg(long)]
        merge: bool,
    },
    /// List recent commits, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the tree recorded for a version
    Fetch { version: String },
    /// Re-commit an earlier version as a new one
    Rollback { version: String },
    /// Structural diff between two versions
    Diff { from: String, to: String },
    /// List replicas registered with the node
    Slaves,
    /// Node role, version and refresh state
    Status,
    /// Ask a replica to refresh now
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut client = HttpConfigClient::new();
    if let Some(token) = &cli.token {
        client = client.with_token(token.clone());
    }
    let url = cli.url.as_str();
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Version => {
            println!("{}", client.get_version(url, timeout).await?);
        }
        Commands::Show => {
            let reply = client.get_snapshot(url, None, timeout).await?;
            match reply.data {
                Some(data) => print!("{}", decode_snapshot(&data)?.to_text()),
                None => eprintln!("Node returned no data for version {}", reply.version),
            }
        }
        Commands::Commit { file, merge } => {
            let text = std::fs::read_to_string(&file)?;
            let payload = encode_snapshot(&ConfigTree::load(&text)?)?;
            let mode = if merge { CommitMode::Merge } else { CommitMode::Replace };
            let version = client.commit(url, &payload, mode, timeout).await?;
            println!("Committed version {}", version);
        }
        Commands::History { limit } => {
            print_json(&client.commit_history(url, limit, timeout).await?)?;
        }
        Commands::Fetch { version } => {
            let data = client.historical_snapshot(url, &Version::new(version), timeout).await?;
            print!("{}", decode_snapshot(&data)?.to_text());
        }
        Commands::Rollback { version } => {
            let new_version = client.rollback(url, &Version::new(version), timeout).await?;
            println!("Rolled back as version {}", new_version);
        }
        Commands::Diff { from, to } => {
            let changes = client
                .diff_versions(url, &Version::new(from), &Version::new(to), timeout)
                .await?;
            print_json(&changes)?;
        }
        Commands::Slaves => print_json(&client.slaves(url, timeout).await?)?,
        Commands::Status => print_json(&client.status(url, timeout).await?)?,
        Commands::Refresh => print_json(&client.force_refresh(url, timeout).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
