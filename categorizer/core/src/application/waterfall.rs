// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Waterfall Orchestrator
//!
//! Runs the ordered decision stages for one transaction and stops at the
//! first that produces a category:
//!
//! ```text
//! Rule (CREDIT) → MCC → Merchant memory → Embedding similarity → AI → Fallback
//! ```
//!
//! Only the rule and MCC stages are synchronous. The remaining stages talk to
//! storage or model providers; any failure there is logged and treated as a
//! miss, so the orchestrator always produces a [`Decision`]. An optional
//! deadline bounds the asynchronous stages; once it elapses the fallback
//! decision is returned.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::ai_classifier::{AiClassifier, ClassificationRequest};
use crate::application::similarity::SimilaritySearch;
use crate::domain::categorization::{CategorizationSource, Confidence, Decision};
use crate::domain::category::{CategoryReference, FALLBACK_CATEGORY, INCOME_CATEGORY};
use crate::domain::config::WaterfallConfig;
use crate::domain::llm::EmbeddingProvider;
use crate::domain::memory::MerchantKey;
use crate::domain::repository::CategorizationStore;
use crate::domain::transaction::{Transaction, TransactionType};

pub const RULE_CONFIDENCE: f64 = 0.99;
pub const MCC_CONFIDENCE: f64 = 0.95;

/// Decision plus the embedding computed along the way, kept for learning
#[derive(Debug, Clone)]
pub struct WaterfallOutcome {
    pub decision: Decision,
    pub embedding: Option<Vec<f32>>,
}

impl WaterfallOutcome {
    fn decided(decision: Decision) -> Self {
        Self {
            decision,
            embedding: None,
        }
    }
}

pub struct WaterfallOrchestrator {
    store: Arc<dyn CategorizationStore>,
    reference: Arc<CategoryReference>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    classifier: Option<AiClassifier>,
    similarity: SimilaritySearch,
    deadline: Option<Duration>,
}

impl WaterfallOrchestrator {
    pub fn new(
        store: Arc<dyn CategorizationStore>,
        reference: Arc<CategoryReference>,
        config: &WaterfallConfig,
    ) -> Self {
        Self {
            store,
            reference,
            embedder: None,
            classifier: None,
            similarity: SimilaritySearch::new(config.similarity_threshold),
            deadline: config.deadline(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_classifier(mut self, classifier: AiClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn reference(&self) -> &CategoryReference {
        &self.reference
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Run with the configured deadline
    pub async fn run(&self, txn: &Transaction, clean_description: &str) -> WaterfallOutcome {
        self.run_with_deadline(txn, clean_description, self.deadline).await
    }

    /// Run with a caller-supplied deadline; `None` lets the stages take as long as they need
    pub async fn run_with_deadline(
        &self,
        txn: &Transaction,
        clean_description: &str,
        deadline: Option<Duration>,
    ) -> WaterfallOutcome {
        if txn.transaction_type == TransactionType::Credit {
            return WaterfallOutcome::decided(Decision::new(
                INCOME_CATEGORY,
                Confidence::new(RULE_CONFIDENCE),
                CategorizationSource::Rule,
            ));
        }

        if let Some(category) = txn.mcc.as_deref().and_then(|mcc| self.reference.category_for_mcc(mcc)) {
            debug!(mcc = ?txn.mcc, category = %category, "MCC match");
            return WaterfallOutcome::decided(Decision::new(
                category,
                Confidence::new(MCC_CONFIDENCE),
                CategorizationSource::Mcc,
            ));
        }

        let cascade = self.learned_and_ai_stages(txn, clean_description);
        match deadline {
            Some(budget) => match tokio::time::timeout_at(Instant::now() + budget, cascade).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(deadline_ms = budget.as_millis() as u64, "Categorization deadline exceeded");
                    WaterfallOutcome::decided(fallback_decision())
                }
            },
            None => cascade.await,
        }
    }

    async fn learned_and_ai_stages(&self, txn: &Transaction, clean_description: &str) -> WaterfallOutcome {
        if let Some(decision) = self.merchant_stage(txn).await {
            return WaterfallOutcome::decided(decision);
        }

        let embedding = self.embed(clean_description).await;
        if let Some(query) = embedding.as_deref() {
            if let Some(decision) = self.similarity_stage(query).await {
                return WaterfallOutcome { decision, embedding };
            }
        }

        let decision = match &self.classifier {
            Some(classifier) => {
                let request = ClassificationRequest {
                    clean_description,
                    amount: txn.amount,
                    mode: &txn.mode,
                    counterparty: txn.counterparty(),
                };
                classifier.classify(&request, &self.reference).await
            }
            None => None,
        };

        WaterfallOutcome {
            decision: decision.unwrap_or_else(fallback_decision),
            embedding,
        }
    }

    async fn merchant_stage(&self, txn: &Transaction) -> Option<Decision> {
        let key = MerchantKey::derive(txn.counterparty().unwrap_or(""));
        if key.is_empty() {
            return None;
        }

        let entry = match self.store.lookup_merchant(&key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(merchant_key = %key, error = %e, "Merchant memory lookup failed");
                return None;
            }
        };
        debug!(merchant_key = %key, category = %entry.category_name, "Merchant memory hit");

        if let Err(e) = self.store.touch_merchant(&key, Utc::now()).await {
            warn!(merchant_key = %key, error = %e, "Failed to record merchant memory usage");
        }

        let hit = entry.as_match();
        Some(Decision::new(
            hit.category_name,
            hit.confidence,
            CategorizationSource::MerchantMemory,
        ))
    }

    async fn embed(&self, clean_description: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        if clean_description.is_empty() {
            return None;
        }
        match embedder.embed(clean_description).await {
            Ok(vector) if vector.len() == embedder.dimensions() => Some(vector),
            Ok(vector) => {
                warn!(
                    expected = embedder.dimensions(),
                    actual = vector.len(),
                    "Embedding provider returned a vector of the wrong dimensionality"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Embedding provider unavailable, skipping similarity stage");
                None
            }
        }
    }

    async fn similarity_stage(&self, query: &[f32]) -> Option<Decision> {
        let candidates = match self.store.scan_embeddings().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Embedding memory scan failed");
                return None;
            }
        };

        let hit = self.similarity.best_match(query, &candidates)?;
        debug!(category = %hit.category_name, similarity = hit.similarity, "Embedding memory hit");
        Some(Decision::new(
            hit.category_name.clone(),
            hit.confidence(),
            CategorizationSource::EmbeddingMemory,
        ))
    }
}

/// Terminal decision when no stage resolves
pub fn fallback_decision() -> Decision {
    Decision::new(FALLBACK_CATEGORY, Confidence::ZERO, CategorizationSource::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::LLMError;
    use crate::domain::memory::MerchantMemoryEntry;
    use crate::domain::transaction::NewTransaction;
    use crate::infrastructure::repositories::InMemoryCategorizationStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LLMError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn reference() -> Arc<CategoryReference> {
        Arc::new(CategoryReference::new(
            vec!["Income".into(), "Food & Dining".into(), "Groceries".into(), "Transfers".into()],
            HashMap::from([("5411".to_string(), "Groceries".to_string())]),
        ))
    }

    fn txn(transaction_type: &str, mcc: Option<&str>, merchant: Option<&str>) -> Transaction {
        NewTransaction {
            account_id: Some("acc_001".into()),
            transaction_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 5),
            amount: Some(Decimal::new(25000, 2)),
            currency: Some("INR".into()),
            transaction_type: Some(transaction_type.into()),
            merchant_name: merchant.map(str::to_string),
            mcc: mcc.map(str::to_string),
            mode: Some("CARD".into()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn orchestrator(store: Arc<InMemoryCategorizationStore>) -> WaterfallOrchestrator {
        WaterfallOrchestrator::new(store, reference(), &WaterfallConfig::default())
    }

    #[tokio::test]
    async fn test_credit_is_income_regardless_of_mcc() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let outcome = orchestrator(store).run(&txn("CREDIT", Some("5411"), None), "salary").await;
        assert_eq!(
            outcome.decision,
            Decision::new("Income", Confidence::new(0.99), CategorizationSource::Rule)
        );
    }

    #[tokio::test]
    async fn test_mcc_beats_merchant_memory() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        store
            .insert_merchant_if_absent(&MerchantMemoryEntry::learned(
                MerchantKey::derive("Fresh Mart"),
                "Fresh Mart",
                "Food & Dining",
                Confidence::new(0.9),
                Utc::now(),
            ))
            .await
            .unwrap();

        let outcome = orchestrator(store)
            .run(&txn("DEBIT", Some("5411"), Some("Fresh Mart")), "fresh mart")
            .await;
        assert_eq!(outcome.decision.category_name, "Groceries");
        assert_eq!(outcome.decision.source, CategorizationSource::Mcc);
        assert_eq!(outcome.decision.confidence.value(), 0.95);
    }

    #[tokio::test]
    async fn test_unknown_mcc_falls_through_to_fallback() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let outcome = orchestrator(store)
            .run(&txn("DEBIT", Some("9999"), Some("Mystery")), "mystery")
            .await;
        assert_eq!(outcome.decision, fallback_decision());
        assert!(outcome.embedding.is_none());
    }

    #[tokio::test]
    async fn test_merchant_hit_touches_usage() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let key = MerchantKey::derive("Fresh Mart");
        store
            .insert_merchant_if_absent(&MerchantMemoryEntry::learned(
                key.clone(),
                "Fresh Mart",
                "Groceries",
                Confidence::new(0.88),
                Utc::now(),
            ))
            .await
            .unwrap();

        let outcome = orchestrator(store.clone())
            .run(&txn("DEBIT", None, Some("FRESH-MART")), "fresh mart")
            .await;
        assert_eq!(
            outcome.decision,
            Decision::new("Groceries", Confidence::new(0.88), CategorizationSource::MerchantMemory)
        );
        assert_eq!(store.lookup_merchant(&key).await.unwrap().unwrap().usage_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_fallback() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let orchestrator = orchestrator(store)
            .with_embedder(Arc::new(SlowEmbedder))
            .with_deadline(Some(Duration::from_millis(500)));

        let outcome = orchestrator.run(&txn("DEBIT", None, Some("Slow Shop")), "slow shop").await;
        assert_eq!(outcome.decision, fallback_decision());
    }
}
