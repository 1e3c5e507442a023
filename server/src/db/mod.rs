// server/src/db/mod.rs

pub mod pg_store;
pub mod rows;

pub use pg_store::PgStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::errors::Result;

pub async fn connect(database_url: &str) -> Result<PgPool> {
  let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
  info!("Successfully connected to the database.");
  Ok(pool)
}

/// Applies the embedded migrations under `server/migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  info!("Database migrations applied.");
  Ok(())
}
