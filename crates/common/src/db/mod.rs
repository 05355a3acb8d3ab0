//! Database layer for catman
//!
//! Provides:
//! - SeaORM entity models
//! - The `CatalogStore` seam with SeaORM and in-memory implementations
//! - Connection pool management and migrations

mod memory;
pub mod models;
mod repository;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use models::ArticleUpdate;
pub use repository::Repository;
pub use store::CatalogStore;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

async fn connect(url: &str, config: &DatabaseConfig, role: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", role, e),
        })
}

/// Database connection pool wrapper
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Connect to the primary and, when configured, the read replica
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect(&config.url, config, "primary").await?;

        let replica = match config.read_url.as_deref() {
            Some(read_url) => {
                info!("Connecting to read replica...");
                Some(connect(read_url, config, "replica").await?)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Round-trip to every connection
    pub async fn ping(&self) -> Result<()> {
        self.primary.ping().await.map_err(|e| AppError::DatabaseConnection {
            message: format!("Primary ping failed: {}", e),
        })?;

        if let Some(replica) = &self.replica {
            replica.ping().await.map_err(|e| AppError::DatabaseConnection {
                message: format!("Replica ping failed: {}", e),
            })?;
        }

        Ok(())
    }

    /// Apply pending SQL migrations from `dir` on the primary connection
    pub async fn migrate(&self, dir: &str) -> Result<()> {
        info!(dir, "Running database migrations...");

        let migrator = sqlx::migrate::Migrator::new(Path::new(dir)).await?;
        migrator
            .run(self.primary.get_postgres_connection_pool())
            .await?;

        info!("Database migrations applied");
        Ok(())
    }
}
