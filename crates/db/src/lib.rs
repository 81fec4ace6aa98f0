//! Document store for decks, slides and the change log.
//!
//! The engine only sees the traits in [`store`]. Two backends implement
//! them: [`memory::MemoryStore`] for in-process use and tests, and
//! [`pg::PgStore`], which keeps every deck and slide as one JSONB document
//! in PostgreSQL.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;
pub mod tree;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from the database configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
}

/// Verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
