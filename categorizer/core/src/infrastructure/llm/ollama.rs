// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

// Ollama Provider Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments for both chat and embeddings

use crate::domain::llm::{EmbeddingProvider, GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            dimensions: 768,
        }
    }

    /// Expected embedding length of the configured model
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response, LLMError> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout(0)
                } else {
                    LLMError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system_prompt {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            format: options.json_mode.then_some("json"),
            options: Some(OllamaOptions {
                temperature: options.temperature,
                seed: options.seed,
                num_predict: options.max_tokens.map(|t| t as i32),
            }),
        };

        let ollama_response: OllamaChatResponse = self
            .post("/api/chat", &request)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        Ok(GenerationResponse {
            text: ollama_response.message.content,
            provider: "ollama".to_string(),
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Server is up if it can list its models
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        if text.is_empty() {
            return Err(LLMError::InvalidInput("cannot embed empty text".into()));
        }

        let request = OllamaEmbedRequest {
            model: &self.model,
            input: text,
        };
        let response: OllamaEmbedResponse = self
            .post("/api/embed", &request)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("Embedding response contained no vectors".into()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_chat_uses_json_format() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "llama3.2",
                "stream": false,
                "format": "json",
                "options": {"temperature": 0.0, "seed": 123, "num_predict": 256}
            })))
            .with_status(200)
            .with_body(r#"{"model":"llama3.2","message":{"role":"assistant","content":"{\"category_name\":\"Travel\"}"},"done":true}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2".into());
        let response = adapter.generate("classify", &GenerationOptions::default()).await.unwrap();
        assert_eq!(response.text, r#"{"category_name":"Travel"}"#);
        assert_eq!(response.provider, "ollama");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_model() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/embed")
            .with_status(404)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "nomic-embed-text".into());
        let err = adapter.embed("uber trip").await.unwrap_err();
        assert!(matches!(err, LLMError::ModelNotFound(model) if model == "nomic-embed-text"));
    }

    #[tokio::test]
    async fn test_embed_takes_first_vector() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/embed")
            .with_status(200)
            .with_body(r#"{"model":"nomic-embed-text","embeddings":[[0.5,0.5,0.0]]}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "nomic-embed-text".into()).with_dimensions(3);
        assert_eq!(adapter.embed("uber trip").await.unwrap(), vec![0.5, 0.5, 0.0]);
        assert_eq!(adapter.dimensions(), 3);
    }
}
