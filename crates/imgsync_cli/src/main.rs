//! imgsync CLI
//!
//! Command-line tools for inspecting and maintaining the sync state kept in
//! a directory-backed store. Nothing here talks to the remote image store.
//!
//! # Commands
//!
//! - `status` - Summarize sync records and the URL cache
//! - `records` - List sync records
//! - `cache` - Report, sweep or clear the URL cache
//! - `clear-owner` - Delete every record of one owner
//! - `config check` - Validate a JSON config file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// imgsync command-line maintenance tools.
#[derive(Parser)]
#[command(name = "imgsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize sync records and the URL cache
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List sync records
    Records {
        /// Only show records of this owner
        #[arg(short, long)]
        owner: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Inspect or clean the URL cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Delete every sync record of one owner
    ClearOwner {
        /// Owner id
        owner: String,
    },

    /// Configuration file tools
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and size
    Size,

    /// Evict expired entries
    Sweep {
        /// JSON config file supplying the cache TTL
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a JSON config file and print the effective values
    Check {
        /// Config file path
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Store path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Records { owner, format } => {
            let path = cli.path.ok_or("Store path required for records")?;
            commands::records::run(&path, owner.as_deref(), &format)?;
        }
        Commands::Cache { action } => {
            let path = cli.path.ok_or("Store path required for cache")?;
            match action {
                CacheAction::Size => commands::cache::size(&path)?,
                CacheAction::Sweep { config } => commands::cache::sweep(&path, config.as_deref())?,
                CacheAction::Clear => commands::cache::clear(&path)?,
            }
        }
        Commands::ClearOwner { owner } => {
            let path = cli.path.ok_or("Store path required for clear-owner")?;
            commands::clear_owner::run(&path, &owner)?;
        }
        Commands::Config {
            action: ConfigAction::Check { file },
        } => {
            commands::config::check(&file)?;
        }
        Commands::Version => {
            println!("imgsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
