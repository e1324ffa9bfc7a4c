// SPDX-License-Identifier: MIT

//! Postgres connection pool setup and migration runner.

use crate::error::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Open a pool against `database_url` and run pending migrations.
///
/// Migrations are forward-only and written to be safe to re-run against a
/// database that already has some of them applied: `CREATE TABLE IF NOT
/// EXISTS`, `ADD COLUMN IF NOT EXISTS`, and a `CHECK` constraint added
/// only when missing.
pub async fn connect_and_migrate(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
