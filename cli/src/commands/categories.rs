// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Category catalog commands
//!
//! Commands: list

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use spendlens_core::application::CategorizationService;

use crate::embedded::EmbeddedCategorizer;

#[derive(Subcommand)]
pub enum CategoriesCommand {
    /// List valid categories with their descriptions
    List {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: CategoriesCommand, categorizer: &EmbeddedCategorizer) -> Result<()> {
    match command {
        CategoriesCommand::List { json } => {
            let categories = categorizer.service().list_categories().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                for category in &categories {
                    println!("  {:<20} {}", category.name.bold(), category.description.dimmed());
                }
            }
            Ok(())
        }
    }
}
