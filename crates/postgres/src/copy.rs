//! COPY-based bulk loader.
//!
//! Rows are streamed through `COPY ... FROM STDIN` in text format, one line
//! per row, inside an explicit transaction that is committed once. There is
//! no staging file and no per-row INSERT.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::SecondsFormat;
use engine_core::{Error, LogRow, Result, StorageConnection, LOG_COLUMNS};
use futures::{pin_mut, SinkExt};
use tokio_postgres::{Client, Transaction};
use tracing::{debug, warn};

use crate::config::PostgresConfig;

/// Builds the `COPY ... FROM STDIN` statement for a table.
pub fn copy_statement(quoted_table: &str) -> String {
    format!(
        "COPY {} ({}) FROM STDIN",
        quoted_table,
        LOG_COLUMNS.join(", ")
    )
}

/// A worker-owned connection that bulk-loads rows with COPY.
pub struct PgCopyConnection {
    client: Client,
    statement: String,
}

impl PgCopyConnection {
    pub fn new(client: Client, config: &PostgresConfig) -> Self {
        Self {
            client,
            statement: copy_statement(&config.quoted_table()),
        }
    }
}

#[async_trait]
impl StorageConnection for PgCopyConnection {
    async fn copy_rows(&mut self, rows: &[LogRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| Error::flush(format!("failed to begin transaction: {}", e)))?;

        let streamed = stream_rows(&tx, &self.statement, rows).await;
        match streamed {
            Ok(copied) => {
                tx.commit()
                    .await
                    .map_err(|e| Error::flush(format!("commit failed: {}", e)))?;
                debug!(rows = copied, "COPY committed");
                Ok(copied)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback after failed COPY also failed");
                }
                Err(Error::flush(format!("COPY failed: {}", e)))
            }
        }
    }
}

async fn stream_rows(
    tx: &Transaction<'_>,
    statement: &str,
    rows: &[LogRow],
) -> std::result::Result<u64, tokio_postgres::Error> {
    let sink = tx.copy_in(statement).await?;
    pin_mut!(sink);

    let mut line = BytesMut::with_capacity(8 * 1024);
    for row in rows {
        encode_row(row, &mut line);
        // feed() lets the sink coalesce lines into larger CopyData frames
        sink.feed(line.split().freeze()).await?;
    }

    sink.as_mut().finish().await
}

/// Appends one row in COPY text format, terminated by a newline.
pub fn encode_row(row: &LogRow, buf: &mut BytesMut) {
    let ts = row.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);

    let fields: [&str; 6] = [
        &ts,
        &row.agent_id,
        row.level.as_str(),
        &row.action,
        &row.payload,
        &row.embedding,
    ];

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buf.put_u8(b'\t');
        }
        escape_into(field, buf);
    }
    buf.put_u8(b'\n');
}

/// Escapes the characters COPY text format treats specially.
fn escape_into(field: &str, buf: &mut BytesMut) {
    buf.reserve(field.len());
    for &b in field.as_bytes() {
        match b {
            b'\\' => buf.put_slice(b"\\\\"),
            b'\t' => buf.put_slice(b"\\t"),
            b'\n' => buf.put_slice(b"\\n"),
            b'\r' => buf.put_slice(b"\\r"),
            _ => buf.put_u8(b),
        }
    }
}
