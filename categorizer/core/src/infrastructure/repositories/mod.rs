// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of [`CategorizationStore`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist transactions and learned memory
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresCategorizationStore** - PostgreSQL tables with unique
//!   constraints and `ON CONFLICT DO NOTHING` promotions
//! - **InMemoryCategorizationStore** - lock-protected maps for tests and
//!   local runs; each insert-or-ignore holds the write lock across its
//!   existence check, so concurrent promotions behave like the unique
//!   constraints of the PostgreSQL backend

pub mod postgres;

pub use postgres::PostgresCategorizationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::category::{default_categories, default_mcc_entries, Category, MccEntry};
use crate::domain::memory::{EmbeddingMemoryEntry, MerchantKey, MerchantMemoryEntry, StoredEmbedding};
use crate::domain::repository::{CategorizationStore, RepositoryError};
use crate::domain::transaction::{TransactionFilter, TransactionRecord};

#[derive(Default)]
struct MemoryState {
    merchants: HashMap<MerchantKey, MerchantMemoryEntry>,
    /// Insertion order is scan order
    embeddings: Vec<EmbeddingMemoryEntry>,
    patterns: HashSet<String>,
    transactions: Vec<TransactionRecord>,
    transaction_ids: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct InMemoryCategorizationStore {
    categories: Arc<Vec<Category>>,
    mcc_map: Arc<HashMap<String, String>>,
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryCategorizationStore {
    /// Empty store with no reference data
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(categories: Vec<Category>, mcc: Vec<MccEntry>) -> Self {
        Self {
            categories: Arc::new(categories),
            mcc_map: Arc::new(mcc.into_iter().map(|e| (e.mcc, e.category_name)).collect()),
            state: Arc::default(),
        }
    }

    /// Store seeded with the built-in catalog
    pub fn with_defaults() -> Self {
        Self::with_reference(default_categories(), default_mcc_entries())
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    pub async fn merchant_count(&self) -> usize {
        self.state.read().await.merchants.len()
    }

    pub async fn embedding_count(&self) -> usize {
        self.state.read().await.embeddings.len()
    }
}

#[async_trait]
impl CategorizationStore for InMemoryCategorizationStore {
    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.categories.iter().map(|c| c.name.clone()).collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.categories.as_ref().clone())
    }

    async fn mcc_map(&self) -> Result<HashMap<String, String>, RepositoryError> {
        Ok(self.mcc_map.as_ref().clone())
    }

    async fn lookup_merchant(&self, key: &MerchantKey) -> Result<Option<MerchantMemoryEntry>, RepositoryError> {
        Ok(self.state.read().await.merchants.get(key).cloned())
    }

    async fn touch_merchant(&self, key: &MerchantKey, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(entry) = self.state.write().await.merchants.get_mut(key) {
            entry.touch(at);
        }
        Ok(())
    }

    async fn insert_merchant_if_absent(&self, entry: &MerchantMemoryEntry) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if state.merchants.contains_key(&entry.merchant_key) {
            return Ok(false);
        }
        state.merchants.insert(entry.merchant_key.clone(), entry.clone());
        Ok(true)
    }

    async fn find_embedding_pattern(&self, pattern_text: &str) -> Result<Option<EmbeddingMemoryEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .embeddings
            .iter()
            .find(|e| e.pattern_text == pattern_text)
            .cloned())
    }

    async fn scan_embeddings(&self) -> Result<Vec<StoredEmbedding>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .embeddings
            .iter()
            .map(|e| StoredEmbedding {
                category_name: e.category_name.clone(),
                embedding: e.embedding.clone(),
            })
            .collect())
    }

    async fn insert_embedding_if_absent(&self, entry: &EmbeddingMemoryEntry) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.patterns.insert(entry.pattern_text.clone()) {
            return Ok(false);
        }
        state.embeddings.push(entry.clone());
        Ok(true)
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.transaction_ids.insert(record.transaction_id().to_string()) {
            return Err(RepositoryError::Duplicate(format!(
                "transaction {}",
                record.transaction_id()
            )));
        }
        state.transactions.push(record.clone());
        Ok(())
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|r| r.transaction_id() == transaction_id)
            .cloned())
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut records: Vec<TransactionRecord> = state
            .transactions
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        // Stable sort keeps later inserts first among equal dates
        records.sort_by(|a, b| b.transaction.transaction_date.cmp(&a.transaction.transaction_date));
        records.truncate(filter.limit);
        Ok(records)
    }
}
