//! feedstore - command-line front end for the feed cache.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use feedstore_core::SystemClock;

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "feedstore", about = "Inspect and manage a cached image feed", version)]
struct Cli {
    /// Cache file (JSON). Without it the cache lives in memory for this run only.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log everything (trace level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cached feed.
    Retrieve,
    /// Replace the cached feed with the records in a JSON file.
    Insert {
        /// JSON array of feed images.
        #[arg(long)]
        feed: PathBuf,
        /// Cache timestamp (RFC 3339). Defaults to now.
        #[arg(long, value_parser = commands::parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Delete the cached feed.
    Delete,
    /// Run a short insert/retrieve walkthrough.
    Demo,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("feedstore: error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if cli.store.is_some() {
        config.store.path = cli.store.clone();
    }
    if cli.verbose {
        config.log.level = "trace".to_string();
    } else if cli.quiet {
        config.log.level = "error".to_string();
    }
    config.log.json |= cli.json_logs;

    logging::init_tracing(&config.log.level, config.log.json)?;

    let store = commands::open_store(config.store.path.as_deref(), &config.store.label)?;

    let output = match &cli.command {
        Command::Retrieve => commands::retrieve(&store).await,
        Command::Insert { feed, timestamp } => {
            commands::insert(&store, feed, *timestamp, &SystemClock).await
        }
        Command::Delete => commands::delete(&store).await,
        Command::Demo => commands::demo(&store).await,
    };
    store.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}
