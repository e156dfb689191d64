use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

/// Connect to the remote record database, if one is configured.
/// A connection failure leaves the service running on the local store.
pub async fn init_db(database_url: Option<&str>) -> Option<PgPool> {
    let database_url = database_url?;
    info!("Connecting to database...");

    // Create a new PostgreSQL connection pool with a maximum of 5 connections
    match PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
    {
        Ok(pool) => {
            info!("Database connection established");
            Some(pool)
        }
        Err(e) => {
            warn!("Database unreachable, continuing without it: {}", e);
            None
        }
    }
}
