// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the SpendLens CLI

pub mod categories;
pub mod categorize;
pub mod config;
pub mod transactions;

pub use self::categories::CategoriesCommand;
pub use self::categorize::CategorizeArgs;
pub use self::config::ConfigCommand;
pub use self::transactions::TransactionsCommand;
