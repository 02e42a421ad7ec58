//! Error containment: storage failures are logged and counted, never raised.

use std::time::Duration;

use integration_tests::{
    fixtures::{self, TEST_DIMENSION},
    mocks::MockStorage,
    setup::{start_engine, test_config, wait_until},
};
use worker::WorkerState;

/// A rolled-back flush loses its rows and the worker keeps going.
#[tokio::test]
async fn test_flush_failure_is_contained() {
    let storage = MockStorage::new();
    storage.set_fail_flush(true);
    let engine = start_engine(test_config(1, 1), &storage);
    let metrics = engine.metrics();

    engine
        .ingest_batch(fixtures::batch(0, 4, TEST_DIMENSION))
        .await;
    assert!(wait_until(Duration::from_secs(2), || metrics.flush_failures.get() == 1).await);

    storage.set_fail_flush(false);
    engine
        .ingest_batch(fixtures::batch(4, 3, TEST_DIMENSION))
        .await;
    let report = engine.stop().await;

    assert_eq!(storage.row_count(), 3);
    assert_eq!(report.rows_lost(), 4);
    assert_eq!(report.rows_written(), 3);
    assert_eq!(report.metrics.flush_failures, 1);
    assert_eq!(report.workers[0].final_state, WorkerState::Terminated);
}

#[tokio::test]
async fn test_drain_flush_failure_still_terminates() {
    let storage = MockStorage::new();
    storage.set_fail_flush(true);
    let engine = start_engine(test_config(2, 5000), &storage);

    engine
        .ingest_batch(fixtures::batch(0, 5, TEST_DIMENSION))
        .await;
    let report = engine.stop().await;

    assert_eq!(storage.row_count(), 0);
    assert_eq!(report.rows_lost(), 5);
    assert!(report
        .workers
        .iter()
        .all(|w| w.final_state == WorkerState::Terminated));
}

/// A worker that cannot connect is gone for good; the rest carry the load.
#[tokio::test]
async fn test_connect_failure_reduces_parallelism() {
    let storage = MockStorage::new();
    storage.fail_connect_for([0]);
    let engine = start_engine(test_config(3, 5000), &storage);
    let metrics = engine.metrics();

    assert!(
        wait_until(Duration::from_secs(2), || metrics.worker_connect_failures.get() == 1
            && metrics.live_workers.get() == 2)
        .await
    );

    for batch in fixtures::batches(6, 5, TEST_DIMENSION) {
        engine.ingest_batch(batch).await;
    }
    let report = engine.stop().await;

    assert_eq!(storage.row_count(), 30);
    assert_eq!(report.failed_workers(), 1);
    assert!(storage.flushes().iter().all(|f| f.worker_id != 0));

    let dead = report.workers.iter().find(|w| w.worker_id == 0).unwrap();
    assert!(!dead.connected);
    assert_eq!(dead.final_state, WorkerState::Terminated);
    assert_eq!(dead.batches, 0);
}

#[tokio::test]
async fn test_connect_retries_are_bounded() {
    let storage = MockStorage::new();
    storage.set_fail_connect(true);
    let config = test_config(2, 10).with_connect_policy(3, Duration::from_millis(1));
    let engine = start_engine(config, &storage);

    let report = engine.stop().await;

    assert_eq!(storage.connect_attempts(), 6);
    assert_eq!(report.failed_workers(), 2);
    assert_eq!(report.metrics.worker_connect_failures, 2);
    assert_eq!(report.metrics.live_workers, 0);
}

/// With every worker dead the producer is not left blocked on a full queue.
#[tokio::test]
async fn test_ingest_after_all_workers_died_does_not_block() {
    let storage = MockStorage::new();
    storage.set_fail_connect(true);
    let engine = start_engine(test_config(2, 10).with_queue_capacity(1), &storage);
    let metrics = engine.metrics();

    assert!(wait_until(Duration::from_secs(2), || metrics.worker_connect_failures.get() == 2).await);

    let ingest = async {
        for batch in fixtures::batches(3, 4, TEST_DIMENSION) {
            engine.ingest_batch(batch).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), ingest)
        .await
        .expect("ingest_batch blocked with no live workers");

    let report = engine.stop().await;
    assert_eq!(storage.row_count(), 0);
    assert_eq!(report.metrics.rows_lost, 12);
    assert_eq!(report.rows_lost(), 12);
    assert_eq!(report.metrics.batches_enqueued, 0);
}

/// Batches already queued when the last worker gives up are counted as lost.
#[tokio::test]
async fn test_batches_queued_before_workers_fail_are_counted() {
    let storage = MockStorage::new();
    storage.set_fail_connect(true);
    let engine = start_engine(test_config(2, 10).with_queue_capacity(4), &storage);

    for batch in fixtures::batches(2, 4, TEST_DIMENSION) {
        engine.ingest_batch(batch).await;
    }
    let report = engine.stop().await;

    assert_eq!(storage.row_count(), 0);
    assert_eq!(report.rows_written(), 0);
    assert_eq!(report.rows_dropped(), 0);
    assert_eq!(report.metrics.rows_lost, 8);
    assert_eq!(report.rows_lost(), 8);
    assert_eq!(report.metrics.queue_depth, 0);
}
