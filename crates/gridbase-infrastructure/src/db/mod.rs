//! Database connection pool setup, built from [`crate::config::DatabaseConfig`]
//! and handed to `gridbase-providers`' sea-orm-backed port implementations.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use gridbase_domain::error::{Error, Result};

use crate::config::DatabaseConfig;

/// Open a pooled connection using the sizing from `config`.
///
/// # Errors
///
/// Returns [`Error::Database`] if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(true);

    Database::connect(options).await.map_err(|err| Error::Database {
        message: format!("failed to connect to database: {err}"),
        source: Some(Box::new(err)),
    })
}
