// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-process categorizer
//!
//! Builds the storage backend, model providers and categorization service
//! from a loaded configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use spendlens_core::application::StandardCategorizationService;
use spendlens_core::domain::config::CategorizerConfig;
use spendlens_core::domain::repository::{CategorizationStore, StorageBackend};
use spendlens_core::infrastructure::db::Database;
use spendlens_core::infrastructure::llm::ProviderRegistry;
use spendlens_core::infrastructure::repositories::{InMemoryCategorizationStore, PostgresCategorizationStore};

pub struct EmbeddedCategorizer {
    service: Arc<StandardCategorizationService>,
    ephemeral: bool,
}

impl EmbeddedCategorizer {
    pub async fn new(config: &CategorizerConfig) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let backend = config.spec.storage.resolve()?;
        let ephemeral = matches!(backend, StorageBackend::InMemory);
        let store = Self::open_store(config, backend).await?;
        let registry = ProviderRegistry::from_config(&config.spec.providers, &config.spec.retry);

        let mut service = StandardCategorizationService::load(store, config.spec.waterfall.clone())
            .await
            .context("Failed to load category reference data")?;
        if let Some(chat) = registry.chat() {
            service = service.with_llm(chat);
        }
        if let Some(embedder) = registry.embedding() {
            service = service.with_embedder(embedder);
        }

        Ok(Self {
            service: Arc::new(service),
            ephemeral,
        })
    }

    async fn open_store(config: &CategorizerConfig, backend: StorageBackend) -> Result<Arc<dyn CategorizationStore>> {
        let reference = &config.spec.reference;

        match backend {
            StorageBackend::InMemory => {
                info!("Using in-memory storage");
                Ok(Arc::new(InMemoryCategorizationStore::with_reference(
                    reference.categories.clone(),
                    reference.mcc.clone(),
                )))
            }
            StorageBackend::PostgreSQL(postgres) => {
                info!("Connecting to PostgreSQL");
                let database = Database::new(&postgres.connection_string, postgres.max_connections)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                database.migrate().await.context("Failed to create database schema")?;
                database
                    .seed_reference(&reference.categories, &reference.mcc)
                    .await
                    .context("Failed to seed reference data")?;
                Ok(Arc::new(PostgresCategorizationStore::new(&database)))
            }
        }
    }

    pub fn service(&self) -> Arc<StandardCategorizationService> {
        self.service.clone()
    }

    /// True when history and learned memory are discarded at exit
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Warns that `command` reads or builds state this process will not keep
    pub fn warn_if_ephemeral(&self, command: &str) -> bool {
        if self.ephemeral {
            warn!(
                command,
                "Storage backend is in_memory: transaction history and learned merchants do not survive this run. \
                 Configure spec.storage.backend: postgres to keep them"
            );
        }
        self.ephemeral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_core::application::CategorizationService;

    #[tokio::test]
    async fn test_default_config_builds_in_memory_categorizer() {
        let categorizer = EmbeddedCategorizer::new(&CategorizerConfig::default()).await.unwrap();
        let categories = categorizer.service().list_categories().await.unwrap();
        assert_eq!(categories.len(), 20);
        assert!(categorizer.is_ephemeral());
        assert!(categorizer.warn_if_ephemeral("transactions list"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = CategorizerConfig::default();
        config.spec.waterfall.similarity_threshold = 1.5;
        assert!(EmbeddedCategorizer::new(&config).await.is_err());
    }
}
