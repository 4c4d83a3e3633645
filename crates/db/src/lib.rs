//! Persistence for campaigns, recipients, conversations and webhook audits.
//!
//! Callers go through the [`DeliveryStore`] trait. [`PgDeliveryStore`] is the
//! production implementation over the sqlx repositories;
//! [`MemoryDeliveryStore`] backs tests and local runs without Postgres.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::memory::MemoryDeliveryStore;
pub use store::postgres::PgDeliveryStore;
pub use store::{DeliveryStore, MergeOutcome, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
