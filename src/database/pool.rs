//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::info;

use crate::database::validation::ValidationRepository;
use crate::database::StorageError;

pub struct DatabasePool {
    pool: PgPool,
    validation: Arc<ValidationRepository>,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!(max_connections, "Connected to PostgreSQL");

        let validation = Arc::new(ValidationRepository::new(pool.clone()));

        Ok(Self { pool, validation })
    }

    pub async fn init_schema(&self) -> Result<(), StorageError> {
        info!("Initializing database schema...");
        self.validation.init_schema().await?;
        info!("Database schema initialized");
        Ok(())
    }

    /// Shared handle for the worker
    pub fn validation(&self) -> Arc<ValidationRepository> {
        self.validation.clone()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
