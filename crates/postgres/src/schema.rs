//! Table schema for agent logs.
//!
//! - TIMESTAMPTZ for event time
//! - JSONB payload
//! - pgvector `vector(D)` embedding, usable with `<->` / `<=>` operators

use engine_core::{Error, Result};
use tokio_postgres::Client;
use tracing::info;

/// SQL enabling the pgvector extension.
pub const CREATE_VECTOR_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS vector";

/// SQL for creating the agent log table with a `dimension`-wide embedding column.
///
/// No secondary indexes: they slow COPY down and are added separately when needed.
pub fn create_table_sql(quoted_table: &str, dimension: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    ts TIMESTAMPTZ NOT NULL,
    agent_id TEXT NOT NULL,
    level TEXT NOT NULL,
    action TEXT NOT NULL,
    payload JSONB NOT NULL,
    embedding vector({dimension})
)
"#,
        table = quoted_table,
        dimension = dimension
    )
}

/// All schema statements, in execution order.
pub fn all_statements(quoted_table: &str, dimension: usize) -> Vec<String> {
    vec![
        CREATE_VECTOR_EXTENSION.to_string(),
        create_table_sql(quoted_table, dimension),
    ]
}

/// Creates the extension and table if they don't exist. Never drops data.
pub async fn init_schema(client: &Client, quoted_table: &str, dimension: usize) -> Result<()> {
    for sql in all_statements(quoted_table, dimension) {
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| Error::schema(format!("failed to execute DDL: {}", e)))?;
    }

    info!(table = %quoted_table, dimension, "Schema ready");
    Ok(())
}
