// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use spendlens_core::domain::config::{CategorizerConfig, ProviderConfig};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./spendlens-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = CategorizerConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SPENDLENS_CONFIG_PATH: {}",
            std::env::var("SPENDLENS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./spendlens-config.yaml");
        println!("  4. ~/.spendlens/config.yaml");
        println!("  5. /etc/spendlens/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    if let Some(url) = &spec.storage.database_url {
        println!("  Database URL: {}", redact(url));
    }
    println!();

    println!("{}", "Providers:".bold());
    print_provider("Chat", spec.providers.chat.as_ref());
    print_provider("Embedding", spec.providers.embedding.as_ref());
    println!(
        "  Retry: {} attempts, {}ms base delay (max {}ms, jitter {}ms), {}ms per attempt",
        spec.retry.max_attempts,
        spec.retry.base_delay_ms,
        spec.retry.max_delay_ms,
        spec.retry.jitter_ms,
        spec.retry.attempt_timeout_ms
    );
    println!();

    println!("{}", "Waterfall:".bold());
    println!("  Similarity threshold: {}", spec.waterfall.similarity_threshold);
    println!("  Promotion threshold: {}", spec.waterfall.promotion_threshold);
    match spec.waterfall.deadline_ms {
        Some(ms) => println!("  Deadline: {}ms", ms),
        None => println!("  Deadline: {}", "(none)".dimmed()),
    }
    println!(
        "  Reference: {} categories, {} MCC codes",
        spec.reference.categories.len(),
        spec.reference.mcc.len()
    );
    println!();

    Ok(())
}

fn print_provider(slot: &str, provider: Option<&ProviderConfig>) {
    match provider {
        Some(p) => {
            let state = if p.enabled { "" } else { " [disabled]" };
            println!("  {}: {:?} {}{}", slot, p.provider_type, p.model, state);
            if !p.endpoint.is_empty() {
                println!("    Endpoint: {}", p.endpoint);
            }
        }
        None => println!("  {}: {}", slot, "(none)".dimmed()),
    }
}

/// Hide credentials embedded in a connection string
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CategorizerConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
