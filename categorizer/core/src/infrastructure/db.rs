// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into [`PostgresCategorizationStore`](super::repositories::PostgresCategorizationStore),
//! and owns the schema bootstrap.
//!
//! The unique constraints on `merchant_category_memory.merchant_key`,
//! `embedding_memory.pattern_text` and `transactions.transaction_id` are
//! what make concurrent promotions safe; do not drop them.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::domain::category::{Category, MccEntry};
use crate::domain::repository::RepositoryError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id BIGSERIAL PRIMARY KEY,
        category_name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mcc_category_map (
        mcc TEXT PRIMARY KEY,
        category_name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS merchant_category_memory (
        merchant_key TEXT PRIMARY KEY,
        merchant_display_name TEXT NOT NULL,
        category_name TEXT NOT NULL,
        confidence DOUBLE PRECISION NOT NULL,
        source TEXT NOT NULL,
        first_seen TIMESTAMPTZ NOT NULL,
        last_seen TIMESTAMPTZ NOT NULL,
        usage_count BIGINT NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS embedding_memory (
        id BIGSERIAL PRIMARY KEY,
        pattern_text TEXT NOT NULL UNIQUE,
        category_name TEXT NOT NULL,
        embedding REAL[] NOT NULL,
        usage_count BIGINT NOT NULL DEFAULT 1,
        first_seen TIMESTAMPTZ NOT NULL,
        last_seen TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        seq BIGSERIAL,
        transaction_id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        account_name TEXT,
        transaction_date DATE NOT NULL,
        amount NUMERIC NOT NULL,
        currency TEXT NOT NULL,
        transaction_type TEXT NOT NULL,
        beneficiary_name TEXT,
        remarks TEXT,
        merchant_name TEXT,
        mcc TEXT,
        mode TEXT NOT NULL,
        raw_description TEXT,
        clean_description TEXT NOT NULL,
        category_name TEXT NOT NULL,
        confidence DOUBLE PRECISION NOT NULL,
        source TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions (transaction_date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions (category_name)",
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    /// Insert reference rows that are missing; existing rows are left alone
    pub async fn seed_reference(&self, categories: &[Category], mcc: &[MccEntry]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO categories (category_name, description)
                VALUES ($1, $2)
                ON CONFLICT (category_name) DO NOTHING
                "#,
            )
            .bind(&category.name)
            .bind(&category.description)
            .execute(&mut *tx)
            .await?;
        }
        for entry in mcc {
            sqlx::query(
                r#"
                INSERT INTO mcc_category_map (mcc, category_name)
                VALUES ($1, $2)
                ON CONFLICT (mcc) DO NOTHING
                "#,
            )
            .bind(&entry.mcc)
            .bind(&entry.category_name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!(categories = categories.len(), mcc_codes = mcc.len(), "Reference data seeded");
        Ok(())
    }
}
