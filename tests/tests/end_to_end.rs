use cubeload::export::export_csv;
use cubeload::prelude::*;
use cubeload_tests::*;
use mock_service::{MockConfig, MockServer};
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

async fn connect(server: &MockServer) -> Arc<Tm1Connection> {
    let conn = Tm1Connection::connect(&server_config(server))
        .await
        .expect("connects to mock");
    Arc::new(conn)
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn two_levels_written_to_csv() {
    let server = MockServer::spawn(MockConfig {
        delay: Duration::from_millis(100),
        ..MockConfig::default()
    })
    .await
    .unwrap();
    let connection = connect(&server).await;

    let run = run_config(&[1, 2]);
    let table = run_all_levels(connection.clone(), &run, "SELECT FROM [ReadTest]").await;

    let dir = tempfile::tempdir().unwrap();
    let path = export_csv(dir.path(), &table).unwrap();
    let rows = read_rows(&path);

    assert_eq!(rows.len(), 2);
    for (row, level) in rows.iter().zip(["1", "2"]) {
        assert_eq!(row[0], level);
        assert_eq!(row[1], "0");
        assert!(row[2].parse::<f64>().unwrap() >= 0.1);
        assert_eq!(row[3], "false");
        assert_eq!(row[4], "0");
    }

    // Every cellset was cleaned up after counting.
    let stats = server.stats();
    assert_eq!(stats.executed, 3);
    assert_eq!(stats.live_cellsets, 0);

    connection.logout().await.unwrap();
    assert_eq!(server.stats().logouts, 1);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn injected_failures_are_counted_per_round() {
    // Executions are numbered across the run: 1 | 2 3 4 5 | 6..=13.
    let server = MockServer::spawn(MockConfig {
        delay: Duration::from_millis(5),
        fail_every: NonZeroU64::new(4),
        ..MockConfig::default()
    })
    .await
    .unwrap();
    let connection = connect(&server).await;

    let table = run_all_levels(connection, &run_config(&[1, 4, 8]), "SELECT").await;
    let failed: Vec<_> = table.iter().map(|r| r.failed).collect();
    let partial: Vec<_> = table.iter().map(|r| r.partial).collect();

    assert_eq!(failed, vec![0, 1, 2]);
    assert_eq!(partial, vec![false, true, true]);
    assert_eq!(server.stats().rejected, 3);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn server_concurrency_cap_shows_as_partial_failure() {
    let server = MockServer::spawn(MockConfig {
        delay: Duration::from_millis(300),
        max_concurrent: Some(2),
        ..MockConfig::default()
    })
    .await
    .unwrap();
    let connection = connect(&server).await;

    let table = run_all_levels(connection, &run_config(&[2, 4]), "SELECT").await;
    let records = table.records();

    assert_eq!(records[0].failed, 0);
    assert!(!records[0].partial);
    assert_eq!(records[1].failed, 2);
    assert!(records[1].partial);
    assert!(records[1].failed <= records[1].queries);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn benchmark_runs_every_level_despite_total_failure() {
    let server = MockServer::spawn(MockConfig {
        delay: Duration::ZERO,
        fail_every: NonZeroU64::new(1),
        ..MockConfig::default()
    })
    .await
    .unwrap();
    let connection = connect(&server).await;

    let table = Benchmark::new(connection)
        .config(run_config(&[1, 3, 5]))
        .replica(2)
        .await;

    assert_eq!(table.len(), 3);
    for record in &table {
        assert_eq!(record.failed, record.queries);
        assert!(record.partial);
        assert_eq!(record.replicas, 2);
    }
}

#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn rounds_are_logged() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();
    let connection = connect(&server).await;

    run_all_levels(connection, &run_config(&[1, 2]), "SELECT").await;

    assert!(logs_contain("Queries=1"));
    assert!(logs_contain("Queries=2"));
    assert!(logs_contain("Benchmark complete"));
}
