// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat-completions and embeddings APIs.
// Also serves Azure OpenAI deployments (api-key header, deployment URL,
// api-version query) and OpenAI-compatible servers.

use crate::domain::llm::{EmbeddingProvider, GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ApiFlavor {
    OpenAI,
    Azure { api_version: String },
}

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    flavor: ApiFlavor,
    dimensions: usize,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            flavor: ApiFlavor::OpenAI,
            dimensions: 1536,
        }
    }

    /// Azure OpenAI: `model` is the deployment name
    pub fn azure(endpoint: String, api_key: String, deployment: String, api_version: String) -> Self {
        Self {
            flavor: ApiFlavor::Azure { api_version },
            ..Self::new(endpoint, api_key, deployment)
        }
    }

    /// Expected embedding length; vectors of any other length are skipped by the waterfall
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn url(&self, operation: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.flavor {
            ApiFlavor::OpenAI => format!("{}/{}", base, operation),
            ApiFlavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                base, self.model, operation, api_version
            ),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.flavor {
            ApiFlavor::OpenAI => request.header("Authorization", format!("Bearer {}", self.api_key)),
            ApiFlavor::Azure { .. } => request.header("api-key", &self.api_key),
        }
    }

    fn provider_name(&self) -> &'static str {
        match self.flavor {
            ApiFlavor::OpenAI => "openai",
            ApiFlavor::Azure { .. } => "azure-openai",
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, operation: &str, body: &T) -> Result<reqwest::Response, LLMError> {
        let response = self
            .authorize(self.client.post(self.url(operation)))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else if status == 400 {
                LLMError::InvalidInput(error_text)
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        Ok(response)
    }
}

fn network_error(e: reqwest::Error) -> LLMError {
    if e.is_timeout() {
        LLMError::Timeout(0)
    } else {
        LLMError::Network(e.to_string())
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            seed: options.seed,
            response_format: options.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response: ChatResponse = self
            .post("chat/completions", &request)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        Ok(GenerationResponse {
            text,
            provider: self.provider_name().to_string(),
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = match &self.flavor {
            ApiFlavor::OpenAI => format!("{}/models", self.endpoint.trim_end_matches('/')),
            ApiFlavor::Azure { api_version } => format!(
                "{}/openai/models?api-version={}",
                self.endpoint.trim_end_matches('/'),
                api_version
            ),
        };

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(network_error)?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        if text.is_empty() {
            return Err(LLMError::InvalidInput("cannot embed empty text".into()));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbeddingResponse = self
            .post("embeddings", &request)
            .await?
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LLMError::Provider("Embedding response contained no data".into()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
