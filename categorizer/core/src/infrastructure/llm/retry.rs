// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Provider Resilience
//!
//! Bounded retry for model calls. Every attempt runs under its own timeout;
//! transient failures are retried after an exponential backoff with random
//! jitter. Non-retryable errors (bad credentials, bad input) return at once.
//!
//! The wrappers implement the same domain ports as the adapters they wrap,
//! so the waterfall never knows whether a provider is resilient or not.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::config::RetryConfig;
use crate::domain::llm::{EmbeddingProvider, GenerationOptions, GenerationResponse, LLMError, LLMProvider};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ms: u64,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ms: config.jitter_ms,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt + 1` (attempt is zero-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        exponential + Duration::from_millis(jitter)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(LLMError::Timeout(self.attempt_timeout.as_millis() as u64)),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            attempt += 1;
            if !error.is_retryable() || attempt >= self.max_attempts {
                if attempt > 1 {
                    warn!(operation, attempts = attempt, error = %error, "Provider call failed after retries");
                }
                return Err(error);
            }

            let delay = self.backoff(attempt - 1);
            debug!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying provider call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Chat provider with timeout and retry
pub struct ResilientLLMProvider {
    inner: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
}

impl ResilientLLMProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMProvider for ResilientLLMProvider {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.policy
            .run("generate", || self.inner.generate(prompt, options))
            .await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.inner.health_check().await
    }
}

/// Embedding provider with timeout and retry
pub struct ResilientEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl ResilientEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        self.policy.run("embed", || self.inner.embed(text)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyEmbedder {
        failures: u32,
        error: fn() -> LLMError,
        calls: AtomicU32,
    }

    impl FlakyEmbedder {
        fn new(failures: u32, error: fn() -> LLMError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LLMError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct HangingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HangingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LLMError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 400,
            jitter_ms: 0,
            attempt_timeout_ms: 1_000,
        })
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy(5);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(400));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            jitter_ms: 1_000,
            attempt_timeout_ms: 20_000,
        });
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(2_000));
            assert!(delay <= Duration::from_millis(3_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let inner = FlakyEmbedder::new(2, || LLMError::Network("reset".into()));
        let provider = ResilientEmbeddingProvider::new(inner.clone(), policy(3));

        assert_eq!(provider.embed("uber").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let inner = FlakyEmbedder::new(10, || LLMError::RateLimit);
        let provider = ResilientEmbeddingProvider::new(inner.clone(), policy(3));

        assert!(matches!(provider.embed("uber").await, Err(LLMError::RateLimit)));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let inner = FlakyEmbedder::new(10, || LLMError::Authentication("bad key".into()));
        let provider = ResilientEmbeddingProvider::new(inner.clone(), policy(3));

        assert!(matches!(provider.embed("uber").await, Err(LLMError::Authentication(_))));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempts_time_out() {
        let provider = ResilientEmbeddingProvider::new(Arc::new(HangingEmbedder), policy(2));
        let started = tokio::time::Instant::now();

        let err = provider.embed("uber").await.unwrap_err();
        assert!(matches!(err, LLMError::Timeout(1_000)));
        // two 1s attempts plus one 100ms backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_100));
        assert!(elapsed < Duration::from_millis(2_200));
    }
}
