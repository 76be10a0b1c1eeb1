// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SpendLens Core
//!
//! Waterfall transaction categorizer with a self-learning cache.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, categorization pipeline and adapters

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
