//! docbulk CLI - bulk loading into a rate-limited document database
//!
//! This binary provides the command-line interface for provisioning and loading.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docbulk::logging::log_filter;
use docbulk::{connect, ensure_target_provisioned, run_load, Config};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "docbulk")]
#[command(about = "Bulk loader for rate-limited document databases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, collection and bulk-import procedure if missing
    Provision {
        /// Drop and recreate the database first
        #[arg(long)]
        recreate: bool,
    },
    /// Load every matching document file into the collection
    Load {
        /// Directory holding one JSON document per file
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Glob pattern for document files
        #[arg(long)]
        pattern: Option<String>,
        /// Maximum number of files to read
        #[arg(long)]
        max_files: Option<usize>,
        /// Maximum serialized batch size in bytes
        #[arg(long)]
        max_script_size: Option<usize>,
        /// Drop and recreate the database first
        #[arg(long)]
        recreate: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Provision { recreate }) => provision(cli.config.as_deref(), recreate).await,
        Some(Commands::Load {
            dir,
            pattern,
            max_files,
            max_script_size,
            recreate,
        }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = dir {
                config.loader.source_dir = dir;
            }
            if let Some(pattern) = pattern {
                config.loader.file_pattern = pattern;
            }
            if let Some(max_files) = max_files {
                config.loader.max_files = max_files;
            }
            if let Some(max_script_size) = max_script_size {
                config.loader.max_script_size = max_script_size;
            }
            load(config, recreate).await
        }
        Some(Commands::ShowConfig) => show_config(cli.config.as_deref()),
        None => {
            println!("Run 'docbulk load --dir <DIR>' to load documents, or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .init();

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

async fn provision(config_path: Option<&Path>, recreate: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let connection = connect(&config);
    let target =
        ensure_target_provisioned(&connection.resolver, &config.provisioning, recreate).await?;

    println!("Database:    {}", target.database.self_link);
    println!("Collection:  {}", target.collection.self_link);
    println!("Procedure:   {}", target.procedure.self_link);
    Ok(())
}

async fn load(config: Config, recreate: bool) -> Result<()> {
    config.validate()?;
    info!(
        "Loading documents from {}",
        config.loader.source_dir.display()
    );

    let summary = run_load(&config, recreate).await?;

    println!("Target:              {}", summary.target);
    println!(
        "Documents loaded:    {} of {}",
        summary.progress.total_inserted, summary.corpus_documents
    );
    println!("Batches submitted:   {}", summary.progress.batches_submitted);
    println!(
        "Throttled attempts:  {} ({}ms waiting)",
        summary.retry.throttled_attempts,
        summary.retry.total_delay.as_millis()
    );
    println!("Collection size:     {}", summary.documents_stored);
    Ok(())
}

fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
