// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # CategorizationService — Categorize and Persist
//!
//! Application service wiring the pipeline together:
//!
//! ```text
//! NewTransaction ─validate→ Transaction ─normalize→ clean description
//!     ─waterfall→ Decision ─learning loop→ persisted CategorizationResult
//! ```
//!
//! ## Contract
//!
//! `categorize` is all-or-nothing: a result is returned only after the
//! transaction row has been written. Validation and persistence failures
//! are the only errors a caller can see; provider failures degrade the
//! waterfall instead.
//!
//! ## Reference data
//!
//! The category set and MCC map are read from storage once when the service
//! is built and then shared read-only by every call.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};

use crate::application::ai_classifier::AiClassifier;
use crate::application::learning_loop::LearningLoop;
use crate::application::waterfall::WaterfallOrchestrator;
use crate::domain::categorization::CategorizationResult;
use crate::domain::category::{Category, CategoryReference};
use crate::domain::config::WaterfallConfig;
use crate::domain::llm::{EmbeddingProvider, LLMProvider};
use crate::domain::normalizer::{description_source, normalize};
use crate::domain::repository::{CategorizationStore, RepositoryError};
use crate::domain::transaction::{NewTransaction, TransactionFilter, TransactionRecord, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum CategorizationError {
    #[error("Invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
}

/// CategorizationService interface
#[async_trait]
pub trait CategorizationService: Send + Sync {
    /// Categorize a transaction and persist it, using the configured deadline
    async fn categorize(&self, input: NewTransaction) -> Result<CategorizationResult, CategorizationError>;

    /// Categorize with a caller-supplied overall deadline
    async fn categorize_within(
        &self,
        input: NewTransaction,
        deadline: Option<Duration>,
    ) -> Result<CategorizationResult, CategorizationError>;

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, CategorizationError>;

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, CategorizationError>;

    async fn list_categories(&self) -> Result<Vec<Category>, CategorizationError>;
}

/// Standard implementation of CategorizationService
pub struct StandardCategorizationService {
    store: Arc<dyn CategorizationStore>,
    waterfall: WaterfallOrchestrator,
    learning: LearningLoop,
    config: WaterfallConfig,
}

impl StandardCategorizationService {
    pub fn new(
        store: Arc<dyn CategorizationStore>,
        reference: Arc<CategoryReference>,
        config: WaterfallConfig,
    ) -> Self {
        Self {
            waterfall: WaterfallOrchestrator::new(store.clone(), reference, &config),
            learning: LearningLoop::new(store.clone(), config.promotion_threshold),
            store,
            config,
        }
    }

    /// Build the service after loading reference data from storage
    pub async fn load(
        store: Arc<dyn CategorizationStore>,
        config: WaterfallConfig,
    ) -> Result<Self, RepositoryError> {
        let categories = store.categories().await?;
        let mcc_map = store.mcc_map().await?;
        let reference = CategoryReference::new(categories, mcc_map);
        info!(
            categories = reference.names().len(),
            mcc_codes = reference.mcc_count(),
            "Loaded category reference"
        );
        Ok(Self::new(store, Arc::new(reference), config))
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.waterfall = self.waterfall.with_embedder(embedder);
        self
    }

    pub fn with_llm(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        let classifier = AiClassifier::new(
            provider,
            self.config.default_ai_confidence,
            self.config.fail_safe_confidence,
        );
        self.waterfall = self.waterfall.with_classifier(classifier);
        self
    }

    pub fn reference(&self) -> &CategoryReference {
        self.waterfall.reference()
    }
}

#[async_trait]
impl CategorizationService for StandardCategorizationService {
    async fn categorize(&self, input: NewTransaction) -> Result<CategorizationResult, CategorizationError> {
        self.categorize_within(input, self.waterfall.deadline()).await
    }

    async fn categorize_within(
        &self,
        input: NewTransaction,
        deadline: Option<Duration>,
    ) -> Result<CategorizationResult, CategorizationError> {
        let transaction = input.validate()?;
        let span = tracing::info_span!("categorize", transaction_id = %transaction.transaction_id);

        async move {
            let source_text = description_source(
                transaction.raw_description.as_deref(),
                transaction.beneficiary_name.as_deref(),
                transaction.remarks.as_deref(),
            );
            let clean_description = normalize(&source_text);

            let outcome = self
                .waterfall
                .run_with_deadline(&transaction, &clean_description, deadline)
                .await;
            let result = CategorizationResult::from_decision(
                transaction.transaction_id.clone(),
                clean_description,
                outcome.decision,
            );
            info!(
                category = %result.category_name,
                confidence = result.confidence.value(),
                source = %result.source,
                "Final decision"
            );

            self.learning.persist(transaction, &result, outcome.embedding).await?;
            Ok::<_, CategorizationError>(result)
        }
        .instrument(span)
        .await
    }

    async fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>, CategorizationError> {
        Ok(self.store.find_transaction(transaction_id).await?)
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, CategorizationError> {
        Ok(self.store.list_transactions(filter).await?)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CategorizationError> {
        Ok(self.store.list_categories().await?)
    }
}
