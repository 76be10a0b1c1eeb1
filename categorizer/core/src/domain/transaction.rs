// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Transaction Aggregate
//!
//! Typed transaction records and the validation boundary in front of the
//! categorizer. Callers hand in a loosely-populated [`NewTransaction`]
//! (usually deserialized from JSON); [`NewTransaction::validate`] turns it
//! into a [`Transaction`] the waterfall can rely on. After categorization
//! the pair becomes a [`TransactionRecord`], which is written exactly once
//! and never updated.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Transaction input, validated form, and persisted row

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::categorization::{CategorizationResult, CategorizationSource};

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "DEBIT",
            TransactionType::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBIT" => Ok(TransactionType::Debit),
            "CREDIT" => Ok(TransactionType::Credit),
            other => Err(ValidationError::InvalidTransactionType(other.to_string())),
        }
    }
}

/// Unvalidated transaction payload as received from a caller.
///
/// Every field is optional here so that a half-filled payload can still be
/// deserialized and rejected with a precise [`ValidationError`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub beneficiary_name: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub mcc: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub raw_description: Option<String>,
}

impl NewTransaction {
    /// Validate required fields and produce a typed [`Transaction`].
    ///
    /// A missing transaction id is replaced with `txn_<uuid>`. Optional
    /// free-text fields that are blank are normalized to `None`.
    pub fn validate(self) -> Result<Transaction, ValidationError> {
        let account_id = required(self.account_id, "account_id")?;
        let transaction_date = self
            .transaction_date
            .ok_or(ValidationError::MissingField("transaction_date"))?;
        let amount = self.amount.ok_or(ValidationError::MissingField("amount"))?;
        let currency = required(self.currency, "currency")?.to_ascii_uppercase();
        let transaction_type: TransactionType =
            required(self.transaction_type, "transaction_type")?.parse()?;
        let mode = required(self.mode, "mode")?;

        let transaction_id = non_blank(self.transaction_id)
            .unwrap_or_else(|| format!("txn_{}", Uuid::new_v4()));

        Ok(Transaction {
            transaction_id,
            account_id,
            account_name: non_blank(self.account_name),
            transaction_date,
            amount,
            currency,
            transaction_type,
            beneficiary_name: non_blank(self.beneficiary_name),
            remarks: non_blank(self.remarks),
            merchant_name: non_blank(self.merchant_name),
            mcc: non_blank(self.mcc),
            mode,
            raw_description: non_blank(self.raw_description),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::MissingField(field))
}

/// Validated transaction handed to the categorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub account_name: Option<String>,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub beneficiary_name: Option<String>,
    pub remarks: Option<String>,
    pub merchant_name: Option<String>,
    pub mcc: Option<String>,
    pub mode: String,
    pub raw_description: Option<String>,
}

impl Transaction {
    /// Merchant name if present, otherwise the beneficiary name
    pub fn counterparty(&self) -> Option<&str> {
        self.merchant_name
            .as_deref()
            .or(self.beneficiary_name.as_deref())
    }
}

/// Durable row written once per categorization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub clean_description: String,
    pub category_name: String,
    pub confidence: f64,
    pub source: CategorizationSource,
}

impl TransactionRecord {
    pub fn new(transaction: Transaction, result: &CategorizationResult) -> Self {
        Self {
            transaction,
            clean_description: result.clean_description.clone(),
            category_name: result.category_name.clone(),
            confidence: result.confidence.value(),
            source: result.source,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction.transaction_id
    }
}

/// History query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub limit: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            category: None,
            limit: 50,
        }
    }
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        let date = record.transaction.transaction_date;
        if self.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| date > end) {
            return false;
        }
        match &self.category {
            Some(category) => &record.category_name == category,
            None => true,
        }
    }
}

/// Rejections raised before a transaction enters the categorizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid transaction type: '{0}' (expected DEBIT or CREDIT)")]
    InvalidTransactionType(String),
}
