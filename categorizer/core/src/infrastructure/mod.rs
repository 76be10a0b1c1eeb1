// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Storage adapters (PostgreSQL and in-memory) and model provider adapters.

pub mod db;
pub mod llm;
pub mod repositories;
