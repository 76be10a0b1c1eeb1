// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

// Categorizer Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Storage backend selection
// - Chat and embedding provider wiring
// - Retry/backoff policy for provider calls
// - Waterfall thresholds and the per-call deadline
// - Seed reference data for the in-memory backend
// - Logging

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::category::{default_categories, default_mcc_entries, Category, MccEntry};
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "spendlens.io/v1";
pub const KIND: &str = "CategorizerConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizerConfig {
    /// API version (must be "spendlens.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CategorizerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CategorizerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizerSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub waterfall: WaterfallConfig,

    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// Connection string (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl StorageConfig {
    /// Resolve the backend to connect to, expanding an `env:` database URL
    pub fn resolve(&self) -> anyhow::Result<StorageBackend> {
        match self.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let raw = self
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("spec.storage.database_url is required for the postgres backend"))?;
                let connection_string = resolve_secret(raw)
                    .ok_or_else(|| anyhow::anyhow!("Environment variable not set: {}", raw.trim_start_matches("env:")))?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string,
                    max_connections: self.max_connections,
                }))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "azure-openai")]
    AzureOpenAI,
    Ollama,
    /// Offline deterministic embeddings (embedding slot only)
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API endpoint URL (Azure: resource URL)
    #[serde(default)]
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier (Azure: deployment name)
    #[serde(default)]
    pub model: String,

    /// Azure OpenAI api-version query parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output size of the hash embedding provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Chat model behind the AI classifier; absent means the stage always misses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ProviderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            chat: None,
            embedding: Some(ProviderConfig {
                provider_type: ProviderType::Hash,
                endpoint: String::new(),
                api_key: None,
                model: "hash-embedding".to_string(),
                api_version: None,
                enabled: true,
                dimensions: default_dimensions(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per provider call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Upper bound of the random delay added to each backoff
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,

    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
            attempt_timeout_ms: default_attempt_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f64,

    /// Used when the model omits a confidence
    #[serde(default = "default_ai_confidence")]
    pub default_ai_confidence: f64,

    #[serde(default = "default_fail_safe_confidence")]
    pub fail_safe_confidence: f64,

    /// Overall budget for one categorize call; `null` disables it
    #[serde(default = "default_deadline")]
    pub deadline_ms: Option<u64>,
}

impl WaterfallConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            promotion_threshold: default_promotion_threshold(),
            default_ai_confidence: default_ai_confidence(),
            fail_safe_confidence: default_fail_safe_confidence(),
            deadline_ms: default_deadline(),
        }
    }
}

/// Seed data for the in-memory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,

    #[serde(default = "default_mcc_entries")]
    pub mcc: Vec<MccEntry>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            mcc: default_mcc_entries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_backend() -> StorageBackendKind {
    StorageBackendKind::InMemory
}

fn default_max_connections() -> u32 {
    5
}

fn default_dimensions() -> usize {
    384
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    8000
}

fn default_jitter() -> u64 {
    1000
}

fn default_attempt_timeout() -> u64 {
    20_000
}

fn default_similarity_threshold() -> f64 {
    0.70
}

fn default_promotion_threshold() -> f64 {
    0.85
}

fn default_ai_confidence() -> f64 {
    0.80
}

fn default_fail_safe_confidence() -> f64 {
    0.5
}

fn default_deadline() -> Option<u64> {
    Some(30_000)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "spendlens".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CategorizerSpec::default(),
        }
    }
}

/// Resolve a config value that may reference the environment ("env:VAR_NAME")
pub fn resolve_secret(value: &str) -> Option<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var).ok(),
        None => Some(value.to_string()),
    }
}

impl CategorizerConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SPENDLENS_CONFIG_PATH environment variable
    /// 2. ./spendlens-config.yaml (working directory)
    /// 3. ~/.spendlens/config.yaml (user home)
    /// 4. /etc/spendlens/config.yaml (system, Unix) or C:\ProgramData\SpendLens\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SPENDLENS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./spendlens-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".spendlens").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/spendlens/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\SpendLens\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SPENDLENS_DATABASE_URL") {
            tracing::info!("Environment override: SPENDLENS_DATABASE_URL");
            self.spec.storage.database_url = Some(url);
        }

        if let Some(val) = lookup("SPENDLENS_SIMILARITY_THRESHOLD") {
            match val.trim().parse::<f64>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: SPENDLENS_SIMILARITY_THRESHOLD={}", threshold);
                    self.spec.waterfall.similarity_threshold = threshold;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for SPENDLENS_SIMILARITY_THRESHOLD: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("SPENDLENS_DEADLINE_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: SPENDLENS_DEADLINE_MS={}", ms);
                    self.spec.waterfall.deadline_ms = Some(ms);
                }
                Err(_) => tracing::warn!("Invalid value for SPENDLENS_DEADLINE_MS: '{}'. Ignoring.", val),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let waterfall = &self.spec.waterfall;
        for (name, value) in [
            ("similarity_threshold", waterfall.similarity_threshold),
            ("promotion_threshold", waterfall.promotion_threshold),
            ("default_ai_confidence", waterfall.default_ai_confidence),
            ("fail_safe_confidence", waterfall.fail_safe_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("spec.waterfall.{} must be within [0, 1], got {}", name, value);
            }
        }

        if self.spec.retry.max_attempts == 0 {
            anyhow::bail!("spec.retry.max_attempts must be at least 1");
        }

        if self.spec.storage.backend == StorageBackendKind::Postgres
            && self.spec.storage.database_url.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!("spec.storage.database_url is required for the postgres backend");
        }

        for (slot, provider) in [
            ("chat", &self.spec.providers.chat),
            ("embedding", &self.spec.providers.embedding),
        ] {
            let Some(provider) = provider else { continue };
            if !provider.enabled {
                continue;
            }
            if provider.provider_type != ProviderType::Hash && provider.model.is_empty() {
                anyhow::bail!("spec.providers.{} must name a model", slot);
            }
            if provider.provider_type == ProviderType::Hash && slot == "chat" {
                anyhow::bail!("spec.providers.chat cannot use the hash provider");
            }
            if provider.provider_type == ProviderType::Hash && provider.dimensions == 0 {
                anyhow::bail!("spec.providers.{}.dimensions must be positive", slot);
            }
        }

        if self.spec.reference.categories.is_empty() {
            anyhow::bail!("spec.reference.categories cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = CategorizerConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.storage.backend, StorageBackendKind::InMemory);
        assert!(config.spec.providers.chat.is_none());
        assert_eq!(config.spec.waterfall.similarity_threshold, 0.70);
        assert_eq!(config.spec.waterfall.deadline(), Some(Duration::from_secs(30)));
        assert_eq!(config.spec.reference.categories.len(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: spendlens.io/v1
kind: CategorizerConfig
metadata:
  name: test
spec:
  providers:
    chat:
      type: azure-openai
      endpoint: https://example.openai.azure.com
      api_key: env:AZURE_OPENAI_API_KEY
      model: gpt-4o-mini
      api_version: "2024-06-01"
  waterfall:
    deadline_ms: null
"#;
        let config = CategorizerConfig::from_yaml_str(yaml).unwrap();
        let chat = config.spec.providers.chat.as_ref().unwrap();
        assert_eq!(chat.provider_type, ProviderType::AzureOpenAI);
        assert!(chat.enabled);
        assert_eq!(config.spec.retry.max_attempts, 3);
        assert_eq!(config.spec.waterfall.promotion_threshold, 0.85);
        assert_eq!(config.spec.waterfall.deadline(), None);
        assert_eq!(config.spec.reference.mcc.len(), 28);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CategorizerConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = CategorizerConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.metadata.name, "spendlens");
        assert_eq!(
            parsed.spec.providers.embedding.unwrap().provider_type,
            ProviderType::Hash
        );
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = CategorizerConfig::default();
        config.spec.waterfall.deadline_ms = None;
        config.to_yaml_file(&path).unwrap();

        let loaded = CategorizerConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.reference.categories.len(), 20);
        assert!(CategorizerConfig::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = CategorizerConfig::default();

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.spec.waterfall.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.spec.waterfall.similarity_threshold = 0.7;

        config.spec.retry.max_attempts = 0;
        assert!(config.validate().is_err());
        config.spec.retry.max_attempts = 3;

        config.spec.storage.backend = StorageBackendKind::Postgres;
        assert!(config.validate().is_err());
        config.spec.storage.database_url = Some("postgres://localhost/spendlens".to_string());
        assert!(config.validate().is_ok());

        config.spec.providers.chat = Some(ProviderConfig {
            provider_type: ProviderType::OpenAI,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: String::new(),
            api_version: None,
            enabled: true,
            dimensions: 384,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CategorizerConfig::default();
        let env = HashMap::from([
            ("SPENDLENS_DATABASE_URL", "postgres://db/spendlens"),
            ("SPENDLENS_SIMILARITY_THRESHOLD", "0.8"),
            ("SPENDLENS_DEADLINE_MS", "not-a-number"),
        ]);
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.spec.storage.database_url.as_deref(), Some("postgres://db/spendlens"));
        assert_eq!(config.spec.waterfall.similarity_threshold, 0.8);
        assert_eq!(config.spec.waterfall.deadline_ms, Some(30_000));
    }

    #[test]
    fn test_resolve_secret() {
        assert_eq!(resolve_secret("plain").as_deref(), Some("plain"));
        assert_eq!(resolve_secret("env:SPENDLENS_TEST_SURELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_storage_resolution() {
        assert_eq!(StorageConfig::default().resolve().unwrap(), StorageBackend::InMemory);

        let postgres = StorageConfig {
            backend: StorageBackendKind::Postgres,
            database_url: Some("postgres://localhost/spendlens".into()),
            max_connections: 2,
        };
        assert_eq!(
            postgres.resolve().unwrap(),
            StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: "postgres://localhost/spendlens".into(),
                max_connections: 2,
            })
        );

        let unresolved = StorageConfig {
            database_url: Some("env:SPENDLENS_TEST_SURELY_UNSET_VAR".into()),
            ..postgres
        };
        assert!(unresolved.resolve().is_err());
    }
}
