use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Creates a PostgreSQL connection pool and applies pending migrations.
/// Connection acquisition is capped at 5s, well inside the request deadline.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;

    info!("PostgreSQL connection pool established, migrations applied");
    Ok(pool)
}
