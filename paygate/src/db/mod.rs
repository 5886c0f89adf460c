//! Database layer for the tenant and transaction tables.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Authorizer / Processor   │
//! └────────────┬─────────────┘
//!              │ TenantStore / TransactionStore
//!              ↓
//! ┌──────────────────────────┐
//! │ PgTenants / PgTransactions│ (db::handlers, wrapped in db::retry)
//! └────────────┬─────────────┘
//!              ↓
//! ┌──────────────────────────┐
//! │ PostgreSQL               │
//! └──────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: store traits and Postgres implementations
//! - [`models`]: row structures
//! - [`errors`]: [`DbError`](errors::DbError), with transient/permanent classification
//! - [`retry`]: exponential backoff for transient failures
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded with [`migrator`]. They run at startup
//! unless `database.run_migrations` is disabled:
//!
//! ```ignore
//! paygate::db::migrator().run(&pool).await?;
//! ```

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

pub mod errors;
pub mod handlers;
pub mod models;
pub mod retry;

/// Get the paygate database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the connection pool and, if configured, run migrations.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await?;

    if config.run_migrations {
        info!("Running database migrations");
        migrator().run(&pool).await?;
    }

    Ok(pool)
}
