// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! AI Classifier
//!
//! Last-resort waterfall stage: asks a chat model to pick one category from
//! the valid set and validates the answer.
//!
//! | Model reply | Outcome |
//! |-------------|---------|
//! | JSON naming a valid category | `ai`, model confidence (default 0.80) |
//! | JSON naming anything else, including a non-string name | `Transfers`, 0.5, `ai_fail_safe` |
//! | Provider error, no JSON object, no `category_name` key | no answer |
//!
//! A confidence outside [0, 1] (e.g. a percentage) is ignored and the default
//! applies.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Prompt construction and response validation

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::categorization::{CategorizationSource, Confidence, Decision};
use crate::domain::category::{CategoryReference, FALLBACK_CATEGORY};
use crate::domain::llm::{GenerationOptions, LLMProvider};

const SYSTEM_PROMPT: &str = "You are a transaction classifier.";

/// Transaction facts shown to the model
#[derive(Debug, Clone)]
pub struct ClassificationRequest<'a> {
    pub clean_description: &'a str,
    pub amount: Decimal,
    pub mode: &'a str,
    pub counterparty: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelReply {
    category_name: serde_json::Value,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

impl ModelReply {
    fn category(&self) -> Option<&str> {
        self.category_name.as_str().map(str::trim)
    }
}

pub struct AiClassifier {
    provider: Arc<dyn LLMProvider>,
    options: GenerationOptions,
    default_confidence: Confidence,
    fail_safe_confidence: Confidence,
}

impl AiClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, default_confidence: f64, fail_safe_confidence: f64) -> Self {
        Self {
            provider,
            options: GenerationOptions {
                system_prompt: Some(SYSTEM_PROMPT.to_string()),
                ..GenerationOptions::default()
            },
            default_confidence: Confidence::new(default_confidence),
            fail_safe_confidence: Confidence::new(fail_safe_confidence),
        }
    }

    /// Classify a transaction; `None` means the model gave no usable answer
    pub async fn classify(
        &self,
        request: &ClassificationRequest<'_>,
        reference: &CategoryReference,
    ) -> Option<Decision> {
        let prompt = build_prompt(request, reference);

        let response = match self.provider.generate(&prompt, &self.options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "AI classifier unavailable, falling through");
                return None;
            }
        };
        debug!(provider = %response.provider, model = %response.model, reply = %response.text, "AI reply");

        let reply = match parse_reply(&response.text) {
            Some(reply) => reply,
            None => {
                warn!(reply = %response.text, "AI reply has no usable JSON object");
                return None;
            }
        };

        let category = match reply.category() {
            Some(category) if reference.contains(category) => category,
            _ => {
                warn!(category = %reply.category_name, "AI proposed a category outside the valid set");
                return Some(Decision::new(
                    FALLBACK_CATEGORY,
                    self.fail_safe_confidence,
                    CategorizationSource::AiFailSafe,
                ));
            }
        };

        let confidence = reply
            .confidence
            .as_ref()
            .and_then(confidence_value)
            .map(Confidence::new)
            .unwrap_or(self.default_confidence);

        Some(Decision::new(category, confidence, CategorizationSource::Ai))
    }
}

fn build_prompt(request: &ClassificationRequest<'_>, reference: &CategoryReference) -> String {
    format!(
        "Classify this transaction into exactly one of these categories: {}.\n\
         Transaction: {}, Amount: {}, Mode: {}, Beneficiary: {}.\n\
         Return JSON only: {{\"category_name\": \"...\", \"confidence\": 0.XX}}",
        reference.names().join(", "),
        request.clean_description,
        request.amount,
        request.mode,
        request.counterparty.unwrap_or(""),
    )
}

/// Accepts numbers and numeric strings within [0, 1]
fn confidence_value(value: &serde_json::Value) -> Option<f64> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (0.0..=1.0).contains(&raw).then_some(raw)
}

/// First JSON object in `text` that carries a `category_name` key.
///
/// Models occasionally wrap the object in prose or code fences, so every
/// `{` is tried as a starting point.
fn parse_reply(text: &str) -> Option<ModelReply> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| {
            let mut stream =
                serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
            match stream.next() {
                Some(Ok(value @ serde_json::Value::Object(_))) => serde_json::from_value(value).ok(),
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{GenerationResponse, LLMError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            assert!(options.json_mode);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(GenerationResponse {
                    text: text.clone(),
                    provider: "scripted".to_string(),
                    model: "test".to_string(),
                }),
                Err(()) => Err(LLMError::Network("connection refused".to_string())),
            }
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn reference() -> CategoryReference {
        CategoryReference::new(
            vec!["Food & Dining".into(), "Transfers".into(), "Charity".into()],
            HashMap::new(),
        )
    }

    fn request() -> ClassificationRequest<'static> {
        ClassificationRequest {
            clean_description: "new cafe test",
            amount: Decimal::new(45000, 2),
            mode: "UPI",
            counterparty: Some("New Cafe Test"),
        }
    }

    #[tokio::test]
    async fn test_valid_category() {
        let provider = ScriptedProvider::replying(r#"{"category_name": "Food & Dining", "confidence": 0.9}"#);
        let classifier = AiClassifier::new(provider.clone(), 0.8, 0.5);
        let decision = classifier.classify(&request(), &reference()).await.unwrap();
        assert_eq!(decision, Decision::new("Food & Dining", Confidence::new(0.9), CategorizationSource::Ai));

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Food & Dining, Transfers, Charity"));
        assert!(prompts[0].contains("Transaction: new cafe test, Amount: 450.00, Mode: UPI, Beneficiary: New Cafe Test"));
    }

    #[tokio::test]
    async fn test_missing_confidence_uses_default() {
        let provider = ScriptedProvider::replying(r#"{"category_name": "Charity"}"#);
        let decision = AiClassifier::new(provider, 0.8, 0.5)
            .classify(&request(), &reference())
            .await
            .unwrap();
        assert_eq!(decision.confidence.value(), 0.8);
        assert_eq!(decision.source, CategorizationSource::Ai);
    }

    #[tokio::test]
    async fn test_hallucinated_category_is_fail_safe() {
        let provider = ScriptedProvider::replying(r#"{"category_name": "Crypto Gambling", "confidence": 0.99}"#);
        let decision = AiClassifier::new(provider, 0.8, 0.5)
            .classify(&request(), &reference())
            .await
            .unwrap();
        assert_eq!(decision, Decision::new("Transfers", Confidence::new(0.5), CategorizationSource::AiFailSafe));
    }

    #[tokio::test]
    async fn test_non_string_category_is_fail_safe() {
        for reply in [
            r#"{"category_name": null, "confidence": 0.9}"#,
            r#"{"category_name": 42, "confidence": 0.9}"#,
            r#"{"category_name": ["Charity"]}"#,
        ] {
            let decision = AiClassifier::new(ScriptedProvider::replying(reply), 0.8, 0.5)
                .classify(&request(), &reference())
                .await
                .unwrap();
            assert_eq!(decision, Decision::new("Transfers", Confidence::new(0.5), CategorizationSource::AiFailSafe));
        }
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_uses_default() {
        for reply in [
            r#"{"category_name": "Charity", "confidence": 90}"#,
            r#"{"category_name": "Charity", "confidence": "87"}"#,
            r#"{"category_name": "Charity", "confidence": -0.2}"#,
        ] {
            let decision = AiClassifier::new(ScriptedProvider::replying(reply), 0.8, 0.5)
                .classify(&request(), &reference())
                .await
                .unwrap();
            assert_eq!(decision, Decision::new("Charity", Confidence::new(0.8), CategorizationSource::Ai));
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_no_answer() {
        let classifier = AiClassifier::new(ScriptedProvider::failing(), 0.8, 0.5);
        assert!(classifier.classify(&request(), &reference()).await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_reply_is_no_answer() {
        let classifier = AiClassifier::new(ScriptedProvider::replying("I think it's food"), 0.8, 0.5);
        assert!(classifier.classify(&request(), &reference()).await.is_none());
    }

    #[test]
    fn test_parse_reply_leniency() {
        let fenced = "Sure!\n```json\n{\"category_name\": \"Charity\", \"confidence\": \"0.87\"}\n```";
        let reply = parse_reply(fenced).unwrap();
        assert_eq!(reply.category(), Some("Charity"));
        assert_eq!(reply.confidence.as_ref().and_then(confidence_value), Some(0.87));

        let nested = r#"{"result": {"x": 1}} then {"category_name": "Transfers"}"#;
        assert_eq!(parse_reply(nested).unwrap().category(), Some("Transfers"));

        assert!(parse_reply(r#"{"category_name": null}"#).is_some());
        assert!(parse_reply(r#"{"confidence": 0.9}"#).is_none());
        assert!(parse_reply("{not json").is_none());
    }
}
