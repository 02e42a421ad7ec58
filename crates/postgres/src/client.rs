//! Connections and the PostgreSQL storage backend.

use std::time::Duration;

use async_trait::async_trait;
use engine_core::{Error, Result, StorageBackend, StorageConnection};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use crate::config::PostgresConfig;
use crate::copy::PgCopyConnection;

/// Opens a single connection and drives it on a background task.
pub async fn connect_client(config: &PostgresConfig) -> Result<Client> {
    let mut pg: tokio_postgres::Config = config
        .url
        .parse()
        .map_err(|e| Error::config(format!("invalid database url: {}", e)))?;
    pg.connect_timeout(Duration::from_secs(config.connect_timeout_secs));

    let (client, connection) = pg
        .connect(NoTls)
        .await
        .map_err(|e| Error::connection(format!("failed to connect to PostgreSQL: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "PostgreSQL connection terminated");
        }
    });

    Ok(client)
}

/// Storage backend handing each worker its own PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PgBackend {
    config: PostgresConfig,
}

impl PgBackend {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

#[async_trait]
impl StorageBackend for PgBackend {
    async fn connect(&self, worker_id: usize) -> Result<Box<dyn StorageConnection>> {
        let client = connect_client(&self.config).await?;
        debug!(worker_id, table = %self.config.table, "Opened PostgreSQL connection");
        Ok(Box::new(PgCopyConnection::new(client, &self.config)))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
