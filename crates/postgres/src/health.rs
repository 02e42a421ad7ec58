//! PostgreSQL health checks and bootstrap.

use std::time::Duration;

use engine_core::{Error, Result};
use tokio_postgres::Client;
use tracing::{debug, error, info, warn};

use crate::client::connect_client;
use crate::config::PostgresConfig;
use crate::schema::init_schema;

/// Check PostgreSQL connection health.
pub async fn check_connection(client: &Client) -> bool {
    match client.simple_query("SELECT 1").await {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}

/// Connects and provisions the schema, retrying with a fixed backoff.
///
/// Meant for bootstrapping against a database that may still be starting.
pub async fn init_schema_with_retry(
    config: &PostgresConfig,
    dimension: usize,
    attempts: u32,
    backoff: Duration,
) -> Result<Client> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = async {
            let client = connect_client(config).await?;
            init_schema(&client, &config.quoted_table(), dimension).await?;
            Ok::<_, Error>(client)
        }
        .await;

        match result {
            Ok(client) => {
                info!(attempt, "Database initialized");
                return Ok(client);
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Database bootstrap failed");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::internal("bootstrap failed with unknown error")))
}
