// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # SpendLens CLI
//!
//! The `spendlens` binary runs the transaction categorizer in-process.
//!
//! ## Commands
//!
//! - `spendlens categorize --file txns.json` - Categorize one transaction or a batch
//! - `spendlens transactions list` - Query categorized history
//! - `spendlens categories list` - Show the valid category set
//! - `spendlens config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use spendlens_cli::commands::{self, CategoriesCommand, CategorizeArgs, ConfigCommand, TransactionsCommand};
use spendlens_cli::embedded::EmbeddedCategorizer;
use spendlens_core::domain::config::CategorizerConfig;

/// SpendLens - Waterfall transaction categorizer
#[derive(Parser)]
#[command(name = "spendlens")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "SPENDLENS_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "SPENDLENS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Overall per-transaction deadline in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    deadline_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorize transactions
    #[command(name = "categorize")]
    Categorize(CategorizeArgs),

    /// Transaction history
    #[command(name = "transactions")]
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommand,
    },

    /// Category catalog
    #[command(name = "categories")]
    Categories {
        #[command(subcommand)]
        command: CategoriesCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = CategorizerConfig::load_or_default(cli.config.clone());

    // Logging comes from the config file unless the flag or RUST_LOG overrides it
    let logging = loaded
        .as_ref()
        .map(|config| config.spec.observability.logging.clone())
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging.format)?;

    let command = match cli.command {
        Some(Commands::Config { command }) => {
            return commands::config::handle_command(command, cli.config).await;
        }
        Some(command) => command,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    };

    let mut config = loaded.context("Failed to load configuration")?;
    if let Some(ms) = cli.deadline_ms {
        config.spec.waterfall.deadline_ms = Some(ms);
    }
    let categorizer = EmbeddedCategorizer::new(&config).await?;

    match command {
        Commands::Categorize(args) => {
            categorizer.warn_if_ephemeral("categorize");
            commands::categorize::handle_command(args, &categorizer).await
        }
        Commands::Transactions { command } => {
            categorizer.warn_if_ephemeral("transactions");
            commands::transactions::handle_command(command, &categorizer).await
        }
        Commands::Categories { command } => commands::categories::handle_command(command, &categorizer).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
