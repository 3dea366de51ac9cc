//! Database module for the key registry
//!
//! Pool construction, migrations, and the Postgres-backed [`KeyRegistry`].
//!
//! [`KeyRegistry`]: sealcodes_core::KeyRegistry

pub mod signing_keys;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

pub use signing_keys::PostgresKeyRegistry;

/// Connect to `database_url` and apply pending migrations.
pub async fn connect(database_url: &str, config: &Config) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

    tracing::info!("Key registry connected and migrations applied");
    Ok(pool)
}
