// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

// Model Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain provider ports and an external API.

pub mod hash_embedding;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod retry;

pub use hash_embedding::HashEmbeddingProvider;
pub use registry::ProviderRegistry;
pub use retry::{ResilientEmbeddingProvider, ResilientLLMProvider, RetryPolicy};
