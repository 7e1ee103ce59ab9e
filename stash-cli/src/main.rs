// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stash CLI
//!
//! Path-addressed storage with a write-through cache in front.

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::StashConfig;
use crate::error::CliResult;

#[derive(Parser)]
#[command(name = "stash")]
#[command(author, version, about = "Stash - Cached path-addressed storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the payload stored at a path
    #[command(alias = "cat")]
    Get {
        /// Path to read
        path: String,
    },

    /// Store a payload at a path
    Set {
        /// Path to write
        path: String,

        /// Inline value (reads stdin when neither a value nor --file is given)
        value: Option<String>,

        /// Read the payload from a file
        #[arg(short, long, conflicts_with = "value")]
        file: Option<PathBuf>,
    },

    /// Check whether a path exists (exit status 1 when absent)
    Contains {
        /// Path to check
        path: String,
    },

    /// Move or rename a path
    Mv {
        /// Source path
        source: String,

        /// Destination path
        dest: String,
    },

    /// Copy a path
    Cp {
        /// Source path
        source: String,

        /// Destination path
        dest: String,
    },

    /// Remove paths
    Rm {
        /// Path(s) to remove
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Update modification times
    Touch {
        /// Path(s) to touch
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List the children of a path
    #[command(alias = "dir")]
    Ls {
        /// Path to list (defaults to the storage root)
        #[arg(default_value = "")]
        path: String,

        /// Long format with modification times
        #[arg(short, long)]
        long: bool,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Show path information
    Stat {
        /// Path to inspect
        path: String,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: u8, configured: Option<&str>) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(fallback)))
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = StashConfig::load(cli.config.as_deref())?;
    // Explicit -v wins over the config file level
    let configured = if cli.verbose == 0 { config.log.level.as_deref() } else { None };
    init_tracing(cli.verbose, configured);

    if let Commands::Config = cli.command {
        commands::config(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let coordinator = config.build_coordinator();
    match cli.command {
        Commands::Get { path } => commands::get(&coordinator, &path).await?,
        Commands::Set { path, value, file } => {
            commands::set(&coordinator, &path, value, file.as_deref()).await?
        }
        Commands::Contains { path } => {
            if !commands::contains(&coordinator, &path).await? {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Mv { source, dest } => commands::mv(&coordinator, &source, &dest).await?,
        Commands::Cp { source, dest } => commands::cp(&coordinator, &source, &dest).await?,
        Commands::Rm { paths } => commands::rm(&coordinator, &paths).await?,
        Commands::Touch { paths } => commands::touch(&coordinator, &paths).await?,
        Commands::Ls { path, long, json } => commands::ls(&coordinator, &path, long, json).await?,
        Commands::Stat { path } => commands::stat(&coordinator, &path).await?,
        Commands::Config => {}
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", style("Error:").red().bold());
            ExitCode::from(2)
        }
    }
}
