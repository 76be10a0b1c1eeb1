// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which waterfall stage produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationSource {
    Rule,
    Mcc,
    MerchantMemory,
    EmbeddingMemory,
    Ai,
    AiFailSafe,
    Unknown,
}

impl CategorizationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorizationSource::Rule => "rule",
            CategorizationSource::Mcc => "mcc",
            CategorizationSource::MerchantMemory => "merchant_memory",
            CategorizationSource::EmbeddingMemory => "embedding_memory",
            CategorizationSource::Ai => "ai",
            CategorizationSource::AiFailSafe => "ai_fail_safe",
            CategorizationSource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CategorizationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategorizationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Self::Rule),
            "mcc" => Ok(Self::Mcc),
            "merchant_memory" => Ok(Self::MerchantMemory),
            "embedding_memory" => Ok(Self::EmbeddingMemory),
            "ai" => Ok(Self::Ai),
            "ai_fail_safe" => Ok(Self::AiFailSafe),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown categorization source: {}", other)),
        }
    }
}

/// Certainty score, always within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    /// Clamp into [0, 1]; NaN becomes 0
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Round to four decimal places (used for similarity scores)
    pub fn rounded(value: f64) -> Self {
        Self::new((value * 10_000.0).round() / 10_000.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Terminal decision of the waterfall, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub category_name: String,
    pub confidence: Confidence,
    pub source: CategorizationSource,
}

impl Decision {
    pub fn new(category_name: impl Into<String>, confidence: Confidence, source: CategorizationSource) -> Self {
        Self {
            category_name: category_name.into(),
            confidence,
            source,
        }
    }
}

/// Output of one categorize-and-persist call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub transaction_id: String,
    pub clean_description: String,
    pub category_name: String,
    pub confidence: Confidence,
    pub source: CategorizationSource,
}

impl CategorizationResult {
    pub fn from_decision(transaction_id: impl Into<String>, clean_description: impl Into<String>, decision: Decision) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            clean_description: clean_description.into(),
            category_name: decision.category_name,
            confidence: decision.confidence,
            source: decision.source,
        }
    }
}
