// backend/src/db/mod.rs

use anyhow::Context;
use sqlx::{Pool, Postgres};
use tracing::info;

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<Pool<Postgres>> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;

    info!(max_connections = config.database_max_connections, "connected to PostgreSQL");
    Ok(pool)
}
