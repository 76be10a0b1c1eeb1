// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Transactions, categories, learned memory and the ports the categorizer
//! depends on. Nothing in here performs I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

pub mod categorization;
pub mod category;
pub mod config;
pub mod llm;
pub mod memory;
pub mod normalizer;
pub mod repository;
pub mod transaction;
