//! SyncCollections CLI
//!
//! Command-line client that syncs collections from a remote API into a
//! local store.
//!
//! # Commands
//!
//! - `load` - Sync collections and print their records
//! - `check` - Compare local and remote counters without downloading
//! - `reset` - Wipe the local store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use synccol::{ReqwestClient, StoreKind, SyncConfig, SyncEngine};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Sync collections from a remote API.
#[derive(Parser)]
#[command(name = "synccol")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (camelCase keys, e.g. `apiUrl`)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Base URL of the remote API
    #[arg(global = true, short, long)]
    api_url: Option<String>,

    /// Storage backend (local-storage, document-db)
    #[arg(global = true, short, long)]
    store: Option<StoreKind>,

    /// Directory for the local store (in memory if omitted; required by
    /// `check` and `reset`)
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Storage namespace
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Bearer token sent as credentials
    #[arg(global = true, long)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync collections and print their records
    Load {
        /// Collection names
        #[arg(required = true)]
        collections: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compare local and remote counters
    Check {
        /// Collection names
        #[arg(required = true)]
        collections: Vec<String>,
    },

    /// Wipe every collection from the local store
    Reset,
}

impl Commands {
    /// Commands that read or wipe earlier runs' data.
    fn needs_persistent_store(&self) -> bool {
        matches!(self, Commands::Check { .. } | Commands::Reset)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = build_config(&cli)?;
    if cli.command.needs_persistent_store() {
        require_data_dir(&config)?;
    }
    debug!(api_url = %config.api_url, store = %config.store, name = %config.name, "configuration loaded");
    let mut client = ReqwestClient::new();
    if let Some(token) = &cli.token {
        client = client.with_bearer_token(token);
    }
    let engine = SyncEngine::builder(config)
        .http_client(Arc::new(client))
        .build()?;

    match cli.command {
        Commands::Load {
            collections,
            format,
        } => {
            commands::load::run(&engine, &collections, &format).await?;
        }
        Commands::Check { collections } => {
            commands::check::run(&engine, &collections).await?;
        }
        Commands::Reset => {
            commands::reset::run(&engine).await?;
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SyncConfig::default(),
    };

    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(store) = cli.store {
        config.store = store;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if cli.token.is_some() {
        config.with_credentials = true;
    }

    if config.api_url.is_empty() {
        return Err("an API URL is required (--api-url or apiUrl in --config)".into());
    }
    Ok(config)
}

fn require_data_dir(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.data_dir.is_none() {
        return Err("a data directory is required (--data-dir or dataDir in --config)".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("synccol").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn check_and_reset_need_a_data_dir() {
        for args in [&["check", "users"][..], &["reset"][..]] {
            let cli = parse(&[&["-a", "http://api.test"][..], args].concat());
            assert!(cli.command.needs_persistent_store());
            let config = build_config(&cli).unwrap();
            assert!(require_data_dir(&config).is_err());
        }
    }

    #[test]
    fn load_runs_in_memory() {
        let cli = parse(&["-a", "http://api.test", "load", "users"]);
        assert!(!cli.command.needs_persistent_store());
        assert!(build_config(&cli).unwrap().data_dir.is_none());
    }

    #[test]
    fn data_dir_flag_satisfies_reset() {
        let cli = parse(&["-a", "http://api.test", "-d", "/tmp/synccol", "reset"]);
        let config = build_config(&cli).unwrap();
        require_data_dir(&config).unwrap();
    }

    #[test]
    fn missing_api_url_is_rejected() {
        let cli = parse(&["load", "users"]);
        assert!(build_config(&cli).is_err());
    }
}
