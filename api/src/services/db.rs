//! Database pool setup
//!
//! Domain query functions take a generic `Executor`, so they run against
//! `&PgPool` directly or `&mut *tx` inside a transaction opened by `PgStore`.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open a pool and bring the schema up to date
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "connected to postgres");

    crate::store::migrations::run(&pool).await?;
    Ok(pool)
}
