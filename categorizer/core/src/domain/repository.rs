// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interface
//!
//! Persistence contract for everything the categorizer reads or writes.
//! The interface lives in the domain layer and is implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Data | Reads | Writes |
//! |------|-------|--------|
//! | Categories / MCC map | `categories`, `list_categories`, `mcc_map` | none |
//! | Merchant memory | `lookup_merchant` | `touch_merchant`, `insert_merchant_if_absent` |
//! | Embedding memory | `scan_embeddings`, `find_embedding_pattern` | `insert_embedding_if_absent` |
//! | Transactions | `find_transaction`, `list_transactions` | `insert_transaction` |
//!
//! ## Uniqueness
//!
//! Merchant keys, embedding pattern texts and transaction ids are unique at
//! the storage level. Both `*_if_absent` operations are insert-or-ignore:
//! the first writer wins and later writers observe `Ok(false)`. This is
//! what keeps concurrent promotions of the same merchant down to a single
//! entry without any application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::category::Category;
use crate::domain::memory::{EmbeddingMemoryEntry, MerchantKey, MerchantMemoryEntry, StoredEmbedding};
use crate::domain::transaction::{TransactionFilter, TransactionRecord};

/// Storage backend selected at startup
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait CategorizationStore: Send + Sync {
    /// Valid category names, in catalog order
    async fn categories(&self) -> Result<Vec<String>, RepositoryError>;

    /// Categories with descriptions
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// MCC code to category name
    async fn mcc_map(&self) -> Result<HashMap<String, String>, RepositoryError>;

    async fn lookup_merchant(&self, key: &MerchantKey) -> Result<Option<MerchantMemoryEntry>, RepositoryError>;

    /// Increment usage count and set last-seen. Missing keys are a no-op.
    async fn touch_merchant(&self, key: &MerchantKey, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Insert-or-ignore keyed on `merchant_key`; `true` when this call inserted
    async fn insert_merchant_if_absent(&self, entry: &MerchantMemoryEntry) -> Result<bool, RepositoryError>;

    async fn find_embedding_pattern(&self, pattern_text: &str) -> Result<Option<EmbeddingMemoryEntry>, RepositoryError>;

    /// Every stored embedding, in insertion order
    async fn scan_embeddings(&self) -> Result<Vec<StoredEmbedding>, RepositoryError>;

    /// Insert-or-ignore keyed on `pattern_text`; `true` when this call inserted
    async fn insert_embedding_if_absent(&self, entry: &EmbeddingMemoryEntry) -> Result<bool, RepositoryError>;

    /// Write a categorized transaction. An existing id yields `Duplicate`.
    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError>;

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, RepositoryError>;

    /// Most recent first, capped at `filter.limit`
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
