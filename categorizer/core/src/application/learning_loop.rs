// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Learning Loop
//!
//! Persists every categorized transaction and, for trusted AI decisions,
//! promotes the result into merchant and embedding memory so the next
//! similar transaction is resolved without a model call.
//!
//! Only the transaction write can fail the call. Promotions are
//! insert-or-ignore at the storage level; losing a race to a concurrent
//! writer is a normal outcome and other promotion failures are logged.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Transaction persistence and cache promotion

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::categorization::{CategorizationResult, Confidence};
use crate::domain::memory::{
    is_promotable, EmbeddingMemoryEntry, MerchantKey, MerchantMemoryEntry, LEARNED_MERCHANT_CONFIDENCE,
};
use crate::domain::repository::{CategorizationStore, RepositoryError};
use crate::domain::transaction::{Transaction, TransactionRecord};

/// What a single persist call learned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningReport {
    pub merchant_promoted: bool,
    pub embedding_promoted: bool,
}

pub struct LearningLoop {
    store: Arc<dyn CategorizationStore>,
    promotion_threshold: f64,
}

impl LearningLoop {
    pub fn new(store: Arc<dyn CategorizationStore>, promotion_threshold: f64) -> Self {
        Self {
            store,
            promotion_threshold,
        }
    }

    pub async fn persist(
        &self,
        transaction: Transaction,
        result: &CategorizationResult,
        embedding: Option<Vec<f32>>,
    ) -> Result<LearningReport, RepositoryError> {
        let record = TransactionRecord::new(transaction, result);
        self.store.insert_transaction(&record).await?;
        debug!(transaction_id = %record.transaction_id(), "Transaction persisted");

        if !is_promotable(result.source, result.confidence, self.promotion_threshold) {
            return Ok(LearningReport::default());
        }

        let merchant_promoted = match record.transaction.counterparty() {
            Some(name) => self.promote_merchant(name, result).await,
            None => false,
        };
        let embedding_promoted = match embedding {
            Some(vector) => self.promote_embedding(&result.clean_description, &result.category_name, vector).await,
            None => false,
        };

        Ok(LearningReport {
            merchant_promoted,
            embedding_promoted,
        })
    }

    async fn promote_merchant(&self, display_name: &str, result: &CategorizationResult) -> bool {
        let key = MerchantKey::derive(display_name);
        if !key.is_learnable() {
            debug!(merchant_key = %key, "Merchant key too short to learn");
            return false;
        }

        match self.store.lookup_merchant(&key).await {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(e) => {
                warn!(merchant_key = %key, error = %e, "Merchant memory lookup failed during promotion");
                return false;
            }
        }

        let entry = MerchantMemoryEntry::learned(
            key.clone(),
            display_name,
            result.category_name.clone(),
            Confidence::new(LEARNED_MERCHANT_CONFIDENCE),
            Utc::now(),
        );
        match self.store.insert_merchant_if_absent(&entry).await {
            Ok(true) => {
                info!(merchant_key = %key, category = %result.category_name, "Learned merchant");
                true
            }
            Ok(false) => {
                debug!(merchant_key = %key, "Merchant already learned by a concurrent call");
                false
            }
            Err(e) => {
                warn!(merchant_key = %key, error = %e, "Failed to learn merchant");
                false
            }
        }
    }

    async fn promote_embedding(&self, pattern_text: &str, category_name: &str, embedding: Vec<f32>) -> bool {
        if pattern_text.is_empty() {
            return false;
        }

        match self.store.find_embedding_pattern(pattern_text).await {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(e) => {
                warn!(pattern = %pattern_text, error = %e, "Embedding memory lookup failed during promotion");
                return false;
            }
        }

        let entry = EmbeddingMemoryEntry::learned(pattern_text, category_name, embedding, Utc::now());
        match self.store.insert_embedding_if_absent(&entry).await {
            Ok(true) => {
                info!(pattern = %pattern_text, category = %category_name, "Learned embedding pattern");
                true
            }
            Ok(false) => {
                debug!(pattern = %pattern_text, "Embedding pattern already learned by a concurrent call");
                false
            }
            Err(e) => {
                warn!(pattern = %pattern_text, error = %e, "Failed to learn embedding pattern");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::categorization::{CategorizationSource, Decision};
    use crate::domain::memory::AI_LEARNED_SOURCE;
    use crate::domain::transaction::NewTransaction;
    use crate::infrastructure::repositories::InMemoryCategorizationStore;
    use rust_decimal::Decimal;

    fn txn(id: &str, merchant: Option<&str>) -> Transaction {
        NewTransaction {
            transaction_id: Some(id.into()),
            account_id: Some("acc_001".into()),
            transaction_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 5),
            amount: Some(Decimal::new(45000, 2)),
            currency: Some("INR".into()),
            transaction_type: Some("DEBIT".into()),
            merchant_name: merchant.map(str::to_string),
            mode: Some("UPI".into()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn result(id: &str, confidence: f64, source: CategorizationSource) -> CategorizationResult {
        CategorizationResult::from_decision(
            id,
            "new cafe test",
            Decision::new("Food & Dining", Confidence::new(confidence), source),
        )
    }

    #[tokio::test]
    async fn test_trusted_ai_decision_is_promoted() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store.clone(), 0.85);

        let report = learning
            .persist(
                txn("txn_1", Some("New Cafe Test")),
                &result("txn_1", 0.9, CategorizationSource::Ai),
                Some(vec![0.1, 0.2, 0.3]),
            )
            .await
            .unwrap();

        assert_eq!(
            report,
            LearningReport {
                merchant_promoted: true,
                embedding_promoted: true
            }
        );
        let entry = store
            .lookup_merchant(&MerchantKey::derive("New Cafe Test"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.category_name, "Food & Dining");
        assert_eq!(entry.usage_count, 1);
        assert_eq!(entry.source, AI_LEARNED_SOURCE);
        assert!(store.find_embedding_pattern("new cafe test").await.unwrap().is_some());
        assert!(store.find_transaction("txn_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_learned_merchant_stores_fixed_confidence() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store.clone(), 0.85);

        learning
            .persist(txn("txn_1", Some("New Cafe Test")), &result("txn_1", 0.99, CategorizationSource::Ai), None)
            .await
            .unwrap();

        let entry = store
            .lookup_merchant(&MerchantKey::derive("New Cafe Test"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.confidence.value(), LEARNED_MERCHANT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_untrusted_decisions_are_only_recorded() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store.clone(), 0.85);

        for (id, confidence, source) in [
            ("txn_1", 0.84, CategorizationSource::Ai),
            ("txn_2", 0.99, CategorizationSource::Rule),
            ("txn_3", 0.5, CategorizationSource::AiFailSafe),
        ] {
            let report = learning
                .persist(txn(id, Some("New Cafe Test")), &result(id, confidence, source), Some(vec![1.0]))
                .await
                .unwrap();
            assert_eq!(report, LearningReport::default());
        }

        assert!(store
            .lookup_merchant(&MerchantKey::derive("New Cafe Test"))
            .await
            .unwrap()
            .is_none());
        assert!(store.scan_embeddings().await.unwrap().is_empty());
        assert_eq!(store.transaction_count().await, 3);
    }

    #[tokio::test]
    async fn test_short_merchant_key_is_not_learned() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store.clone(), 0.85);

        let report = learning
            .persist(txn("txn_1", Some("K.")), &result("txn_1", 0.95, CategorizationSource::Ai), None)
            .await
            .unwrap();
        assert!(!report.merchant_promoted);
        assert!(!report.embedding_promoted);
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store.clone(), 0.85);

        learning
            .persist(txn("txn_1", Some("New Cafe Test")), &result("txn_1", 0.9, CategorizationSource::Ai), None)
            .await
            .unwrap();

        let mut second = result("txn_2", 0.95, CategorizationSource::Ai);
        second.category_name = "Groceries".to_string();
        let report = learning
            .persist(txn("txn_2", Some("new cafe test")), &second, None)
            .await
            .unwrap();

        assert!(!report.merchant_promoted);
        let entry = store
            .lookup_merchant(&MerchantKey::derive("New Cafe Test"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.category_name, "Food & Dining");
    }

    #[tokio::test]
    async fn test_duplicate_transaction_is_fatal() {
        let store = Arc::new(InMemoryCategorizationStore::new());
        let learning = LearningLoop::new(store, 0.85);
        let r = result("txn_1", 0.5, CategorizationSource::Unknown);

        learning.persist(txn("txn_1", None), &r, None).await.unwrap();
        let err = learning.persist(txn("txn_1", None), &r, None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }
}
