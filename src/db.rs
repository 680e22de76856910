// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use deadpool::managed::{Object, Pool, PoolError};
use deadpool::Runtime;
use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DbConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DbPoolError = PoolError<diesel_async::pooled_connection::PoolError>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Postgres-backed store. Cloning shares the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database manager with connection pool, then apply any
    /// pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);

        let pool = DbPool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(Duration::from_secs(config.acquire_timeout_secs)))
            .build()
            .context("failed to build database pool")?;

        let db = Self { pool };

        // Test connection before touching the schema
        let _conn = db
            .get_connection()
            .await
            .map_err(|e| anyhow!("failed to connect to database: {}", e))?;
        info!("Successfully connected to the database");

        let url = config.url.clone();
        tokio::task::spawn_blocking(move || run_migrations(&url))
            .await
            .context("migration task panicked")??;

        Ok(db)
    }

    /// Get a database connection from the pool
    pub async fn get_connection(&self) -> Result<DbConnection, DbPoolError> {
        self.pool.get().await
    }
}

/// Runs on a blocking thread: the migration harness drives a synchronous
/// connection wrapper around the async driver.
fn run_migrations(url: &str) -> Result<()> {
    let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(url)
        .context("failed to open migration connection")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("failed to apply migrations: {}", e))?;
    info!("Database migrations applied successfully ({} new)", applied.len());
    Ok(())
}
