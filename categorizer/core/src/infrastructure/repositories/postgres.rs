// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Categorization Store
//!
//! Production [`CategorizationStore`] backed by the tables created in
//! [`Database::migrate`]. Promotions use `INSERT ... ON CONFLICT DO NOTHING`
//! and report whether a row was written; a duplicate transaction id
//! surfaces as [`RepositoryError::Duplicate`] through the unique-violation
//! mapping on `From<sqlx::Error>`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashMap;

use crate::domain::categorization::{CategorizationSource, Confidence};
use crate::domain::category::Category;
use crate::domain::memory::{EmbeddingMemoryEntry, MerchantKey, MerchantMemoryEntry, StoredEmbedding};
use crate::domain::repository::{CategorizationStore, RepositoryError};
use crate::domain::transaction::{Transaction, TransactionFilter, TransactionRecord, TransactionType};
use crate::infrastructure::db::Database;

pub struct PostgresCategorizationStore {
    pool: PgPool,
}

impl PostgresCategorizationStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.get_pool().clone(),
        }
    }
}

fn usage_count(row: &PgRow) -> Result<u64, RepositoryError> {
    let count: i64 = row.try_get("usage_count")?;
    Ok(count.max(0) as u64)
}

fn merchant_from_row(row: &PgRow) -> Result<MerchantMemoryEntry, RepositoryError> {
    let key: String = row.try_get("merchant_key")?;
    let confidence: f64 = row.try_get("confidence")?;
    Ok(MerchantMemoryEntry {
        merchant_key: MerchantKey::from_stored(key),
        display_name: row.try_get("merchant_display_name")?,
        category_name: row.try_get("category_name")?,
        confidence: Confidence::new(confidence),
        source: row.try_get("source")?,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
        usage_count: usage_count(row)?,
    })
}

fn embedding_from_row(row: &PgRow) -> Result<EmbeddingMemoryEntry, RepositoryError> {
    Ok(EmbeddingMemoryEntry {
        pattern_text: row.try_get("pattern_text")?,
        category_name: row.try_get("category_name")?,
        embedding: row.try_get("embedding")?,
        usage_count: usage_count(row)?,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<TransactionRecord, RepositoryError> {
    let transaction_type: String = row.try_get("transaction_type")?;
    let transaction_type: TransactionType = transaction_type
        .parse()
        .map_err(|e| RepositoryError::Serialization(format!("{}", e)))?;
    let source: String = row.try_get("source")?;
    let source: CategorizationSource = source.parse().map_err(RepositoryError::Serialization)?;
    let transaction_date: NaiveDate = row.try_get("transaction_date")?;
    let amount: Decimal = row.try_get("amount")?;

    Ok(TransactionRecord {
        transaction: Transaction {
            transaction_id: row.try_get("transaction_id")?,
            account_id: row.try_get("account_id")?,
            account_name: row.try_get("account_name")?,
            transaction_date,
            amount,
            currency: row.try_get("currency")?,
            transaction_type,
            beneficiary_name: row.try_get("beneficiary_name")?,
            remarks: row.try_get("remarks")?,
            merchant_name: row.try_get("merchant_name")?,
            mcc: row.try_get("mcc")?,
            mode: row.try_get("mode")?,
            raw_description: row.try_get("raw_description")?,
        },
        clean_description: row.try_get("clean_description")?,
        category_name: row.try_get("category_name")?,
        confidence: row.try_get("confidence")?,
        source,
    })
}

const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, account_name, transaction_date, amount, currency, \
     transaction_type, beneficiary_name, remarks, merchant_name, mcc, mode, raw_description, \
     clean_description, category_name, confidence, source";

#[async_trait]
impl CategorizationStore for PostgresCategorizationStore {
    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT category_name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("category_name").map_err(RepositoryError::from))
            .collect()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query("SELECT category_name, description FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Category, RepositoryError> {
                Ok(Category {
                    name: row.try_get("category_name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn mcc_map(&self) -> Result<HashMap<String, String>, RepositoryError> {
        let rows = sqlx::query("SELECT mcc, category_name FROM mcc_category_map")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<(String, String), RepositoryError> {
                Ok((row.try_get("mcc")?, row.try_get("category_name")?))
            })
            .collect()
    }

    async fn lookup_merchant(&self, key: &MerchantKey) -> Result<Option<MerchantMemoryEntry>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT merchant_key, merchant_display_name, category_name, confidence, source,
                   first_seen, last_seen, usage_count
            FROM merchant_category_memory
            WHERE merchant_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(merchant_from_row).transpose()
    }

    async fn touch_merchant(&self, key: &MerchantKey, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE merchant_category_memory
            SET usage_count = usage_count + 1, last_seen = $2
            WHERE merchant_key = $1
            "#,
        )
        .bind(key.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_merchant_if_absent(&self, entry: &MerchantMemoryEntry) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO merchant_category_memory (
                merchant_key, merchant_display_name, category_name, confidence, source,
                first_seen, last_seen, usage_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (merchant_key) DO NOTHING
            "#,
        )
        .bind(entry.merchant_key.as_str())
        .bind(&entry.display_name)
        .bind(&entry.category_name)
        .bind(entry.confidence.value())
        .bind(&entry.source)
        .bind(entry.first_seen)
        .bind(entry.last_seen)
        .bind(entry.usage_count as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_embedding_pattern(&self, pattern_text: &str) -> Result<Option<EmbeddingMemoryEntry>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT pattern_text, category_name, embedding, usage_count, first_seen, last_seen
            FROM embedding_memory
            WHERE pattern_text = $1
            "#,
        )
        .bind(pattern_text)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(embedding_from_row).transpose()
    }

    async fn scan_embeddings(&self) -> Result<Vec<StoredEmbedding>, RepositoryError> {
        let rows = sqlx::query("SELECT category_name, embedding FROM embedding_memory ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<StoredEmbedding, RepositoryError> {
                Ok(StoredEmbedding {
                    category_name: row.try_get("category_name")?,
                    embedding: row.try_get("embedding")?,
                })
            })
            .collect()
    }

    async fn insert_embedding_if_absent(&self, entry: &EmbeddingMemoryEntry) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO embedding_memory (
                pattern_text, category_name, embedding, usage_count, first_seen, last_seen
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (pattern_text) DO NOTHING
            "#,
        )
        .bind(&entry.pattern_text)
        .bind(&entry.category_name)
        .bind(&entry.embedding)
        .bind(entry.usage_count as i64)
        .bind(entry.first_seen)
        .bind(entry.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        let txn = &record.transaction;
        sqlx::query(&format!(
            "INSERT INTO transactions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            TRANSACTION_COLUMNS
        ))
        .bind(&txn.transaction_id)
        .bind(&txn.account_id)
        .bind(&txn.account_name)
        .bind(txn.transaction_date)
        .bind(txn.amount)
        .bind(&txn.currency)
        .bind(txn.transaction_type.as_str())
        .bind(&txn.beneficiary_name)
        .bind(&txn.remarks)
        .bind(&txn.merchant_name)
        .bind(&txn.mcc)
        .bind(&txn.mode)
        .bind(&txn.raw_description)
        .bind(&record.clean_description)
        .bind(&record.category_name)
        .bind(record.confidence)
        .bind(record.source.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions \
             WHERE ($1::date IS NULL OR transaction_date >= $1) \
               AND ($2::date IS NULL OR transaction_date <= $2) \
               AND ($3::text IS NULL OR category_name = $3) \
             ORDER BY transaction_date DESC, seq DESC \
             LIMIT $4",
            TRANSACTION_COLUMNS
        ))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(&filter.category)
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}
