//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! SQLite-backed storage for the schema registry
//!
//! This module owns the connection pool and the relational schema. All
//! queries live in [`models`] as plain functions over a `SqliteConnection`
//! so the registry can compose them inside a single transaction.

pub mod models;
pub mod sequence;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::config::StorageConfig;
use crate::error::RegistryResult;

/// Relational schema, applied once at startup
///
/// Soft deletion is the nullable `deleted_at` column on subjects, schemas
/// and subject versions. Sequence values only ever grow.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        compatibility TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_subjects_name ON subjects(name)",
    r#"
    CREATE TABLE IF NOT EXISTS schemas (
        id TEXT PRIMARY KEY,
        global_id INTEGER NOT NULL,
        body TEXT NOT NULL,
        hash TEXT NOT NULL,
        schema_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_schemas_global_id ON schemas(global_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_schemas_hash_type ON schemas(hash, schema_type)",
    r#"
    CREATE TABLE IF NOT EXISTS subject_versions (
        id TEXT PRIMARY KEY,
        subject_id TEXT NOT NULL REFERENCES subjects(id),
        schema_id TEXT NOT NULL REFERENCES schemas(id),
        version INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_subject_versions_subject_version
        ON subject_versions(subject_id, version)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_subject_versions_subject_schema
        ON subject_versions(subject_id, schema_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schema_references (
        id TEXT PRIMARY KEY,
        schema_id TEXT NOT NULL REFERENCES schemas(id),
        subject_version_id TEXT NOT NULL REFERENCES subject_versions(id),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(schema_id, subject_version_id),
        UNIQUE(schema_id, name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_schema_references_schema_id ON schema_references(schema_id)",
    r#"
    CREATE INDEX IF NOT EXISTS idx_schema_references_target
        ON schema_references(subject_version_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sequences (
        name TEXT PRIMARY KEY,
        next_value INTEGER NOT NULL DEFAULT 0
    )
    "#,
];

/// Storage handle: a SQLite connection pool plus the migrated schema
#[derive(Clone)]
pub struct Store {
    /// Database connection pool
    pool: SqlitePool,
}

impl Store {
    /// Connect to the configured database and run migrations
    pub async fn connect(config: &StorageConfig) -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect to a fresh in-memory database
    ///
    /// The pool is capped at one connection; each in-memory connection is
    /// its own database.
    pub async fn connect_in_memory() -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the relational schema
    pub async fn migrate(&self) -> RegistryResult<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("database migrations applied");
        Ok(())
    }

    /// Begin a transaction
    pub async fn begin(&self) -> RegistryResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Storage liveness probe
    pub async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = Store::connect_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }
}
