// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Learned Memory Entries
//!
//! The two caches filled by the learning loop:
//!
//! | Cache | Key | Read by | Updated on hit |
//! |-------|-----|---------|----------------|
//! | Merchant memory | [`MerchantKey`] | merchant-cache stage | yes (usage count, last seen) |
//! | Embedding memory | exact pattern text | similarity stage | no |
//!
//! Neither cache is ever deleted from by the categorizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::categorization::{CategorizationSource, Confidence};
use crate::domain::normalizer::normalize;

/// Keys shorter than this are never promoted into merchant memory
pub const MIN_LEARNABLE_KEY_LEN: usize = 3;

/// Source tag stored on merchant entries created from AI decisions
pub const AI_LEARNED_SOURCE: &str = "ai_learned";

/// Confidence stored on every merchant entry learned from an AI decision
pub const LEARNED_MERCHANT_CONFIDENCE: f64 = 0.90;

/// Normalized merchant/beneficiary name with all spaces removed.
///
/// Derivation is a pure function of the normalized text, so the same
/// merchant always collides to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantKey(String);

impl MerchantKey {
    pub fn derive(name: &str) -> Self {
        Self(normalize(name).replace(' ', ""))
    }

    /// Wrap a key read back from storage without re-deriving it
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_learnable(&self) -> bool {
        self.0.chars().count() >= MIN_LEARNABLE_KEY_LEN
    }
}

impl fmt::Display for MerchantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category recalled from merchant memory
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantMatch {
    pub category_name: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantMemoryEntry {
    pub merchant_key: MerchantKey,
    pub display_name: String,
    pub category_name: String,
    pub confidence: Confidence,
    pub source: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub usage_count: u64,
}

impl MerchantMemoryEntry {
    /// Entry learned from a trusted AI decision
    pub fn learned(
        merchant_key: MerchantKey,
        display_name: impl Into<String>,
        category_name: impl Into<String>,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_key,
            display_name: display_name.into(),
            category_name: category_name.into(),
            confidence,
            source: AI_LEARNED_SOURCE.to_string(),
            first_seen: now,
            last_seen: now,
            usage_count: 1,
        }
    }

    pub fn as_match(&self) -> MerchantMatch {
        MerchantMatch {
            category_name: self.category_name.clone(),
            confidence: self.confidence,
        }
    }

    /// Record a cache hit
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_seen = at;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMemoryEntry {
    /// Exact normalized description; acts as the dedup key
    pub pattern_text: String,
    pub category_name: String,
    pub embedding: Vec<f32>,
    pub usage_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl EmbeddingMemoryEntry {
    pub fn learned(
        pattern_text: impl Into<String>,
        category_name: impl Into<String>,
        embedding: Vec<f32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pattern_text: pattern_text.into(),
            category_name: category_name.into(),
            embedding,
            usage_count: 1,
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}

/// Row returned by an embedding-memory scan
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub category_name: String,
    pub embedding: Vec<f32>,
}

/// Whether a decision may be promoted into the caches
pub fn is_promotable(source: CategorizationSource, confidence: Confidence, threshold: f64) -> bool {
    source == CategorizationSource::Ai && confidence.value() >= threshold
}
