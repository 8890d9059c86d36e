use crate::config::DatabaseConfig;
use crate::error::TracedeskError;
use sqlx::{postgres::PgPoolOptions, PgPool};

const TRACES_SCHEMA: &str = include_str!("../migrations/001_create_traces.sql");

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Create the `traces` table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(TRACES_SCHEMA).execute(pool).await?;
    Ok(())
}

/// Connect and make sure the schema is in place.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, TracedeskError> {
    let pool = create_pool(config).await?;
    ensure_schema(&pool).await?;
    tracing::info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}
