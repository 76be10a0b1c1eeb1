// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Categorize transactions from a JSON file or inline flags

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use spendlens_core::application::CategorizationService;
use spendlens_core::domain::categorization::CategorizationResult;
use spendlens_core::domain::transaction::NewTransaction;

use crate::embedded::EmbeddedCategorizer;

#[derive(Args, Debug, Default)]
pub struct CategorizeArgs {
    /// JSON file holding one transaction object or an array of them
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["account_id", "amount"])]
    pub file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub account_id: Option<String>,

    #[arg(long)]
    pub account_name: Option<String>,

    /// Transaction date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub amount: Option<Decimal>,

    #[arg(long)]
    pub currency: Option<String>,

    /// DEBIT or CREDIT
    #[arg(long = "type", value_name = "TYPE")]
    pub transaction_type: Option<String>,

    #[arg(long)]
    pub beneficiary: Option<String>,

    #[arg(long)]
    pub remarks: Option<String>,

    #[arg(long)]
    pub merchant: Option<String>,

    /// Merchant category code
    #[arg(long)]
    pub mcc: Option<String>,

    /// Payment mode (UPI, NEFT, CARD, ...)
    #[arg(long)]
    pub mode: Option<String>,

    /// Raw bank narration
    #[arg(long)]
    pub description: Option<String>,
}

impl CategorizeArgs {
    fn inline_transaction(&self) -> NewTransaction {
        NewTransaction {
            transaction_id: self.id.clone(),
            account_id: self.account_id.clone(),
            account_name: self.account_name.clone(),
            transaction_date: self.date,
            amount: self.amount,
            currency: self.currency.clone(),
            transaction_type: self.transaction_type.clone(),
            beneficiary_name: self.beneficiary.clone(),
            remarks: self.remarks.clone(),
            merchant_name: self.merchant.clone(),
            mcc: self.mcc.clone(),
            mode: self.mode.clone(),
            raw_description: self.description.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TransactionBatch {
    Many(Vec<NewTransaction>),
    One(Box<NewTransaction>),
}

/// Categorization result with the input fields echoed back
#[derive(Debug, Serialize)]
pub struct CategorizedTransaction {
    #[serde(flatten)]
    pub result: CategorizationResult,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub transaction_type: Option<String>,
    pub beneficiary_name: Option<String>,
    pub remarks: Option<String>,
    pub merchant_name: Option<String>,
    pub mcc: Option<String>,
    pub mode: Option<String>,
}

impl CategorizedTransaction {
    pub fn new(input: NewTransaction, result: CategorizationResult) -> Self {
        Self {
            result,
            amount: input.amount,
            currency: input.currency,
            transaction_type: input.transaction_type,
            beneficiary_name: input.beneficiary_name,
            remarks: input.remarks,
            merchant_name: input.merchant_name,
            mcc: input.mcc,
            mode: input.mode,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outcome {
    Categorized(Box<CategorizedTransaction>),
    Failed {
        transaction_id: Option<String>,
        error: String,
    },
}

pub fn read_transactions(path: &Path) -> Result<Vec<NewTransaction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions from {:?}", path))?;
    parse_transactions(&content).with_context(|| format!("Invalid transaction JSON in {:?}", path))
}

fn parse_transactions(content: &str) -> Result<Vec<NewTransaction>> {
    Ok(match serde_json::from_str::<TransactionBatch>(content)? {
        TransactionBatch::Many(transactions) => transactions,
        TransactionBatch::One(transaction) => vec![*transaction],
    })
}

pub async fn handle_command(args: CategorizeArgs, categorizer: &EmbeddedCategorizer) -> Result<()> {
    let inputs = match &args.file {
        Some(path) => read_transactions(path)?,
        None => vec![args.inline_transaction()],
    };

    let service = categorizer.service();
    let total = inputs.len();
    let mut outcomes = Vec::with_capacity(total);

    for input in inputs {
        match service.categorize(input.clone()).await {
            Ok(result) => outcomes.push(Outcome::Categorized(Box::new(CategorizedTransaction::new(input, result)))),
            Err(e) => outcomes.push(Outcome::Failed {
                transaction_id: input.transaction_id,
                error: e.to_string(),
            }),
        }
    }

    let failed = outcomes.iter().filter(|o| matches!(o, Outcome::Failed { .. })).count();

    if args.json {
        let json = if args.file.is_some() {
            serde_json::to_string_pretty(&outcomes)?
        } else {
            serde_json::to_string_pretty(&outcomes[0])?
        };
        println!("{}", json);
    } else {
        outcomes.iter().for_each(print_outcome);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} transactions failed", failed, total);
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Categorized(item) => {
            let result = &item.result;
            println!(
                "{} {} {} ({:.4}, {})",
                "✓".green(),
                result.transaction_id.bold(),
                result.category_name.cyan(),
                result.confidence.value(),
                result.source
            );
            println!("    {}", result.clean_description.dimmed());
            if let (Some(amount), Some(currency)) = (&item.amount, &item.currency) {
                println!(
                    "    {} {} {}",
                    amount,
                    currency,
                    item.transaction_type.as_deref().unwrap_or("")
                );
            }
        }
        Outcome::Failed { transaction_id, error } => {
            eprintln!(
                "{} {} {}",
                "✗".red(),
                transaction_id.as_deref().unwrap_or("(no id)").bold(),
                error.red()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_core::domain::categorization::{CategorizationSource, Confidence, Decision};

    #[test]
    fn test_parse_single_object_and_array() {
        let one = parse_transactions(r#"{"transaction_id": "t1", "amount": "450.00"}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].amount, Some(Decimal::new(45000, 2)));

        let many = parse_transactions(
            r#"[{"transaction_id": "t1", "amount": 12.5}, {"transaction_id": "t2", "transaction_date": "2026-01-05"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].transaction_date, NaiveDate::from_ymd_opt(2026, 1, 5));

        assert!(parse_transactions("42").is_err());
    }

    #[test]
    fn test_echo_flattens_result() {
        let input = NewTransaction {
            amount: Some(Decimal::new(45000, 2)),
            currency: Some("INR".into()),
            merchant_name: Some("New Cafe Test".into()),
            ..Default::default()
        };
        let result = CategorizationResult::from_decision(
            "txn_1",
            "new cafe test",
            Decision::new("Food & Dining", Confidence::new(0.9), CategorizationSource::Ai),
        );
        let json = serde_json::to_value(CategorizedTransaction::new(input, result)).unwrap();

        assert_eq!(json["transaction_id"], "txn_1");
        assert_eq!(json["category_name"], "Food & Dining");
        assert_eq!(json["source"], "ai");
        assert_eq!(json["merchant_name"], "New Cafe Test");
        assert_eq!(json["currency"], "INR");
    }

    #[test]
    fn test_read_transactions_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"[{"transaction_id": "a"}, {"transaction_id": "b"}]"#).unwrap();

        let transactions = read_transactions(&path).unwrap();
        assert_eq!(transactions.len(), 2);
        assert!(read_transactions(&dir.path().join("missing.json")).is_err());
    }
}
