// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

// Provider Registry - builds the chat and embedding providers from configuration
//
// Remote providers are wrapped in the retry policy. A provider that fails to
// initialize is logged and left out; the waterfall treats the missing stage
// as a miss.

use crate::domain::config::{ProviderConfig, ProviderType, ProvidersConfig, RetryConfig};
use crate::domain::llm::{EmbeddingProvider, LLMProvider};
use std::sync::Arc;
use tracing::{info, warn};

use super::hash_embedding::HashEmbeddingProvider;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;
use super::retry::{ResilientEmbeddingProvider, ResilientLLMProvider, RetryPolicy};

const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Configured model providers, ready to inject into the categorization service
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    chat: Option<Arc<dyn LLMProvider>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(providers: &ProvidersConfig, retry: &RetryConfig) -> Self {
        let policy = RetryPolicy::from_config(retry);
        info!("Initializing model provider registry");

        let chat = providers
            .chat
            .as_ref()
            .filter(|config| Self::is_enabled("chat", config))
            .and_then(|config| match Self::create_chat(config, &policy) {
                Ok(provider) => {
                    info!(provider = ?config.provider_type, model = %config.model, "Chat provider ready");
                    Some(provider)
                }
                Err(e) => {
                    warn!("Failed to initialize chat provider: {}", e);
                    None
                }
            });

        let embedding = providers
            .embedding
            .as_ref()
            .filter(|config| Self::is_enabled("embedding", config))
            .and_then(|config| match Self::create_embedding(config, &policy) {
                Ok(provider) => {
                    info!(
                        provider = ?config.provider_type,
                        dimensions = provider.dimensions(),
                        "Embedding provider ready"
                    );
                    Some(provider)
                }
                Err(e) => {
                    warn!("Failed to initialize embedding provider: {}", e);
                    None
                }
            });

        if chat.is_none() {
            warn!("No chat provider configured - AI classification will not be available");
        }
        if embedding.is_none() {
            warn!("No embedding provider configured - similarity search will not be available");
        }

        Self { chat, embedding }
    }

    pub fn chat(&self) -> Option<Arc<dyn LLMProvider>> {
        self.chat.clone()
    }

    pub fn embedding(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedding.clone()
    }

    fn is_enabled(slot: &str, config: &ProviderConfig) -> bool {
        if !config.enabled {
            info!("{} provider disabled, skipping", slot);
        }
        config.enabled
    }

    fn create_chat(config: &ProviderConfig, policy: &RetryPolicy) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match config.provider_type {
            ProviderType::OpenAI => Arc::new(Self::openai(config)?),
            ProviderType::AzureOpenAI => Arc::new(Self::azure(config)?),
            ProviderType::Ollama => Arc::new(OllamaAdapter::new(config.endpoint.clone(), config.model.clone())),
            ProviderType::Hash => anyhow::bail!("hash provider only supports embeddings"),
        };
        Ok(Arc::new(ResilientLLMProvider::new(provider, policy.clone())))
    }

    fn create_embedding(
        config: &ProviderConfig,
        policy: &RetryPolicy,
    ) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match config.provider_type {
            ProviderType::Hash => return Ok(Arc::new(HashEmbeddingProvider::new(config.dimensions))),
            ProviderType::OpenAI => Arc::new(Self::openai(config)?.with_dimensions(config.dimensions)),
            ProviderType::AzureOpenAI => Arc::new(Self::azure(config)?.with_dimensions(config.dimensions)),
            ProviderType::Ollama => Arc::new(
                OllamaAdapter::new(config.endpoint.clone(), config.model.clone())
                    .with_dimensions(config.dimensions),
            ),
        };
        Ok(Arc::new(ResilientEmbeddingProvider::new(provider, policy.clone())))
    }

    fn openai(config: &ProviderConfig) -> anyhow::Result<OpenAIAdapter> {
        Ok(OpenAIAdapter::new(
            config.endpoint.clone(),
            Self::resolve_api_key(&config.api_key)?,
            config.model.clone(),
        ))
    }

    fn azure(config: &ProviderConfig) -> anyhow::Result<OpenAIAdapter> {
        Ok(OpenAIAdapter::azure(
            config.endpoint.clone(),
            Self::resolve_api_key(&config.api_key)?,
            config.model.clone(),
            config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        ))
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) => crate::domain::config::resolve_secret(k).ok_or_else(|| {
                anyhow::anyhow!("Environment variable not set: {}", k.trim_start_matches("env:"))
            }),
            None => Ok(String::new()), // For local providers without auth
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(provider_type: ProviderType) -> ProviderConfig {
        ProviderConfig {
            provider_type,
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            model: "llama3.2".into(),
            api_version: None,
            enabled: true,
            dimensions: 16,
        }
    }

    #[test]
    fn test_default_registry_has_offline_embeddings_only() {
        let registry = ProviderRegistry::from_config(&ProvidersConfig::default(), &RetryConfig::default());
        assert!(registry.chat().is_none());
        assert_eq!(registry.embedding().unwrap().dimensions(), 384);
    }

    #[test]
    fn test_configured_providers() {
        let providers = ProvidersConfig {
            chat: Some(provider(ProviderType::Ollama)),
            embedding: Some(provider(ProviderType::Ollama)),
        };
        let registry = ProviderRegistry::from_config(&providers, &RetryConfig::default());
        assert!(registry.chat().is_some());
        assert_eq!(registry.embedding().unwrap().dimensions(), 16);
    }

    #[test]
    fn test_disabled_and_invalid_providers_are_skipped() {
        let mut disabled = provider(ProviderType::Ollama);
        disabled.enabled = false;
        let providers = ProvidersConfig {
            chat: Some(provider(ProviderType::Hash)),
            embedding: Some(disabled),
        };
        let registry = ProviderRegistry::from_config(&providers, &RetryConfig::default());
        assert!(registry.chat().is_none());
        assert!(registry.embedding().is_none());
    }

    #[test]
    fn test_missing_api_key_variable_skips_provider() {
        let mut openai = provider(ProviderType::OpenAI);
        openai.api_key = Some("env:SPENDLENS_TEST_KEY_THAT_IS_NEVER_SET".into());
        let providers = ProvidersConfig {
            chat: Some(openai),
            embedding: None,
        };
        let registry = ProviderRegistry::from_config(&providers, &RetryConfig::default());
        assert!(registry.chat().is_none());
    }
}
