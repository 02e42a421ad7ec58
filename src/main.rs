//! Agent log ingestion benchmark.
//!
//! Provisions the agent log table, pushes synthetic batches through the
//! ingestion engine into PostgreSQL, then reports throughput and checks the
//! stored row count against what the engine says it wrote.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use tokio::signal;
use tracing::{error, info, warn};

use engine_core::generator::generate_batch;
use postgres_client::{health::check_connection, health::init_schema_with_retry, query::count_rows};
use postgres_client::{PgBackend, PostgresConfig};
use telemetry::{health, init_tracing_from_env, HealthRegistry, HealthStatus};
use worker::{EngineConfig, EngineReport, IngestionEngine};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Events pushed through the engine in one run
    #[serde(default = "default_total_events")]
    total_events: usize,

    #[serde(default)]
    engine: EngineConfig,

    #[serde(default)]
    postgres: PostgresConfig,
}

fn default_total_events() -> usize {
    20_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_events: default_total_events(),
            engine: EngineConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting agent log ingestion benchmark v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let engine_config = &config.engine;

    info!(
        workers = engine_config.worker_count,
        queue_capacity = engine_config.queue_capacity,
        batch_size = engine_config.batch_size,
        flush_threshold = engine_config.flush_threshold,
        dimension = engine_config.embedding_dimension,
        table = %config.postgres.table,
        "Loaded configuration"
    );

    let client = match init_schema_with_retry(
        &config.postgres,
        engine_config.embedding_dimension,
        engine_config.connect_retries,
        engine_config.connect_backoff(),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            health().postgres.set_unhealthy(e.to_string());
            return Err(e).context("Failed to initialize database");
        }
    };

    if check_connection(&client).await {
        health().postgres.set_healthy();
        info!("PostgreSQL connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("PostgreSQL connection: unhealthy");
    }
    ensure!(health().is_ready(), "PostgreSQL is not ready, refusing to ingest");

    let table = config.postgres.quoted_table();
    let before = count_rows(&client, &table)
        .await
        .context("Failed to count existing rows")?;

    let mut engine = IngestionEngine::new(
        engine_config.clone(),
        Arc::new(PgBackend::new(config.postgres.clone())),
    )
    .context("Invalid engine configuration")?;
    engine.start().context("Failed to start ingestion engine")?;
    health().engine.set_healthy();

    // One batch is generated up front so the run measures ingestion only.
    let batch = generate_batch(
        engine_config.batch_size,
        engine_config.embedding_dimension,
        Utc::now(),
    );
    let batches = config.total_events / engine_config.batch_size;
    if batches == 0 {
        warn!(
            total_events = config.total_events,
            batch_size = engine_config.batch_size,
            "Total events below one batch, nothing to ingest"
        );
    }

    info!(batches, events = batches * batch.len(), "Ingesting");
    let start = Instant::now();

    let produce = async {
        for _ in 0..batches {
            engine.ingest_batch(batch.clone()).await;
        }
    };
    tokio::select! {
        _ = produce => {}
        _ = shutdown_signal() => {
            warn!("Interrupted, draining workers");
        }
    }

    let report = engine.stop().await;
    record_engine_health(health(), &report);

    let elapsed = start.elapsed();
    let written = report.rows_written();
    let throughput = written as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    info!(
        duration_ms = %elapsed.as_millis(),
        rows_written = written,
        rows_dropped = report.rows_dropped(),
        rows_lost = report.rows_lost(),
        failed_workers = report.failed_workers(),
        throughput = %format!("{:.0} events/s", throughput),
        "Benchmark complete"
    );
    info!(
        report = %serde_json::to_string(&report).context("Failed to serialize report")?,
        "Engine report"
    );

    let health_report = health().report();
    let health_json =
        serde_json::to_string(&health_report).context("Failed to serialize health report")?;
    if health_report.status == HealthStatus::Healthy {
        info!(health = %health_json, "Health");
    } else {
        warn!(health = %health_json, "Health degraded");
    }

    let after = count_rows(&client, &table)
        .await
        .context("Failed to count stored rows")?;
    let stored = after.saturating_sub(before);

    ensure!(
        stored == written,
        "row count grew by {} but the engine reported {} rows written",
        stored,
        written
    );
    info!(stored, "Row count verified");

    Ok(())
}

/// Marks the engine component from a finished run.
fn record_engine_health(registry: &HealthRegistry, report: &EngineReport) {
    let workers = report.workers.len();
    let failed = report.failed_workers();

    if workers > 0 && failed == workers {
        registry
            .engine
            .set_unhealthy("No worker acquired a storage connection");
    } else if failed > 0 {
        registry
            .engine
            .set_unhealthy(format!("{} of {} workers failed to connect", failed, workers));
    } else if report.rows_lost() > 0 {
        registry
            .engine
            .set_unhealthy(format!("{} rows lost", report.rows_lost()));
    } else {
        registry.engine.set_healthy();
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("AGENTLOG")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Bare names used by deployment scripts take precedence
    let lookup = |key: &str| std::env::var(key).ok();
    config
        .engine
        .apply_env_overrides(lookup)
        .context("Invalid engine override")?;
    config.postgres.apply_env_overrides(lookup);

    if let Ok(total) = std::env::var("TOTAL_EVENTS") {
        config.total_events = total
            .trim()
            .parse()
            .with_context(|| format!("TOTAL_EVENTS must be an integer, got '{}'", total))?;
    }

    config.engine.validate().context("Invalid engine configuration")?;

    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
