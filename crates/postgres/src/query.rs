//! Read-back queries (used in verification and tests).

use chrono::{DateTime, Utc};
use engine_core::{Error, Result};
use tokio_postgres::Client;

/// A row as stored in the agent log table.
#[derive(Debug, Clone)]
pub struct StoredLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub level: String,
    pub action: String,
    pub payload: serde_json::Value,
    pub embedding: Option<String>,
}

/// Count all rows in the table.
pub async fn count_rows(client: &Client, quoted_table: &str) -> Result<u64> {
    let row = client
        .query_one(&format!("SELECT COUNT(*) FROM {}", quoted_table), &[])
        .await
        .map_err(|e| Error::internal(format!("query error: {}", e)))?;
    let count: i64 = row.get(0);
    Ok(count.max(0) as u64)
}

/// Fetch the first `limit` rows in insertion order.
pub async fn sample_rows(client: &Client, quoted_table: &str, limit: i64) -> Result<Vec<StoredLog>> {
    let sql = format!(
        "SELECT id, ts, agent_id, level, action, payload, embedding::text \
         FROM {} ORDER BY id LIMIT $1",
        quoted_table
    );

    let rows = client
        .query(&sql, &[&limit])
        .await
        .map_err(|e| Error::internal(format!("query error: {}", e)))?;

    Ok(rows
        .iter()
        .map(|row| StoredLog {
            id: row.get(0),
            timestamp: row.get(1),
            agent_id: row.get(2),
            level: row.get(3),
            action: row.get(4),
            payload: row.get(5),
            embedding: row.get(6),
        })
        .collect())
}

/// Remove every row (test cleanup).
pub async fn truncate(client: &Client, quoted_table: &str) -> Result<()> {
    client
        .batch_execute(&format!("TRUNCATE TABLE {}", quoted_table))
        .await
        .map_err(|e| Error::internal(format!("truncate error: {}", e)))
}
