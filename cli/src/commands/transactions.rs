// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Transaction history commands
//!
//! Commands: list

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use colored::Colorize;

use spendlens_core::application::CategorizationService;
use spendlens_core::domain::transaction::{TransactionFilter, TransactionRecord};

use crate::embedded::EmbeddedCategorizer;

#[derive(Subcommand)]
pub enum TransactionsCommand {
    /// List categorized transactions, newest first
    List {
        /// Earliest transaction date (inclusive, YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,

        /// Latest transaction date (inclusive, YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,

        /// Only transactions in this category
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: TransactionsCommand, categorizer: &EmbeddedCategorizer) -> Result<()> {
    match command {
        TransactionsCommand::List {
            from,
            to,
            category,
            limit,
            json,
        } => {
            let filter = TransactionFilter {
                start_date: from,
                end_date: to,
                category,
                limit,
            };
            list(filter, json, categorizer).await
        }
    }
}

async fn list(filter: TransactionFilter, json: bool, categorizer: &EmbeddedCategorizer) -> Result<()> {
    let records = categorizer.service().list_transactions(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", "No transactions found".dimmed());
        return Ok(());
    }

    for record in &records {
        print_record(record);
    }
    println!();
    println!("{} transaction(s)", records.len());
    Ok(())
}

fn print_record(record: &TransactionRecord) {
    let txn = &record.transaction;
    println!(
        "{}  {:<24} {:>12} {} {:<7} {:<20} {} ({:.4})",
        txn.transaction_date,
        txn.transaction_id.bold(),
        txn.amount,
        txn.currency,
        txn.transaction_type.as_str(),
        record.category_name.cyan(),
        record.source,
        record.confidence
    );
}
