// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! The categorization pipeline: similarity search, the AI classifier, the
//! waterfall orchestrator, the learning loop and the service that ties
//! them together.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer

pub mod ai_classifier;
pub mod categorization_service;
pub mod learning_loop;
pub mod similarity;
pub mod waterfall;

pub use categorization_service::{CategorizationError, CategorizationService, StandardCategorizationService};
