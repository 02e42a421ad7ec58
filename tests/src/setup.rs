//! Common test setup functions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use postgres_client::{
    health::init_schema_with_retry,
    query::{count_rows, truncate},
    PgBackend, PostgresConfig,
};
use telemetry::{init_tracing, TracingConfig};
use tokio_postgres::Client;
use worker::{EngineConfig, IngestionEngine};

use crate::containers::TestContainers;
use crate::fixtures::TEST_DIMENSION;
use crate::mocks::MockStorage;

/// Installs a quiet subscriber; later calls are no-ops.
pub fn init_test_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    init_tracing(TracingConfig::default().with_filter(filter));
}

/// Small engine config for mock-backed tests.
pub fn test_config(workers: usize, flush_threshold: usize) -> EngineConfig {
    EngineConfig::default()
        .with_worker_count(workers)
        .with_flush_threshold(flush_threshold)
        .with_embedding_dimension(TEST_DIMENSION)
        .with_connect_policy(2, Duration::from_millis(5))
}

/// A started engine wired to `storage`.
pub fn start_engine(config: EngineConfig, storage: &MockStorage) -> IngestionEngine {
    init_test_tracing();
    let mut engine = IngestionEngine::new(config, Arc::new(storage.clone()))
        .expect("Failed to create engine");
    engine.start().expect("Failed to start engine");
    engine
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Test context backed by a real PostgreSQL with pgvector.
pub struct PgTestContext {
    pub containers: TestContainers,
    pub config: PostgresConfig,
    pub client: Client,
}

impl PgTestContext {
    /// Start the database and provision `table`.
    pub async fn new(table: &str, dimension: usize) -> Self {
        init_test_tracing();
        let containers = TestContainers::start().await;

        let config = PostgresConfig::default()
            .with_url(containers.database_url.clone())
            .with_table(table);

        let client = init_schema_with_retry(&config, dimension, 5, Duration::from_secs(1))
            .await
            .expect("Failed to initialize schema");

        truncate(&client, &config.quoted_table())
            .await
            .expect("Failed to truncate table");

        Self {
            containers,
            config,
            client,
        }
    }

    pub fn backend(&self) -> Arc<PgBackend> {
        Arc::new(PgBackend::new(self.config.clone()))
    }

    pub async fn row_count(&self) -> u64 {
        count_rows(&self.client, &self.config.quoted_table())
            .await
            .expect("Count query failed")
    }
}
