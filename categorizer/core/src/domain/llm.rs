// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Model Provider Interfaces
//!
//! Chat-completion and embedding providers as seen by the categorizer.
//! Vendor adapters live in `crate::infrastructure::llm`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer over external model APIs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat-completion provider used by the AI classifier stage
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// Text-embedding provider used by the similarity stage
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError>;

    /// Vector length this provider produces
    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Instructions sent ahead of the user prompt
    pub system_prompt: Option<String>,

    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: Option<f32>,

    /// Best-effort reproducibility where the vendor supports it
    pub seed: Option<u64>,

    /// Ask the vendor to constrain output to a JSON object
    pub json_mode: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tokens: Some(256),
            temperature: Some(0.0),
            seed: Some(123),
            json_mode: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,

    /// Provider name (e.g., "openai", "ollama")
    pub provider: String,

    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl LLMError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::Network(_) | LLMError::RateLimit | LLMError::Provider(_) | LLMError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LLMError::Network("reset".into()).is_retryable());
        assert!(LLMError::RateLimit.is_retryable());
        assert!(LLMError::Timeout(20_000).is_retryable());
        assert!(!LLMError::Authentication("bad key".into()).is_retryable());
        assert!(!LLMError::InvalidInput("empty".into()).is_retryable());
        assert!(!LLMError::Unavailable("disabled".into()).is_retryable());
    }

    #[test]
    fn test_default_options_are_deterministic() {
        let options = GenerationOptions::default();
        assert_eq!(options.temperature, Some(0.0));
        assert!(options.json_mode);
    }
}
