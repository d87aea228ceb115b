use cubeload::prelude::*;
use cubeload::tm1::ConnectError;
use cubeload::{ConfigFile, Connection};
use cubeload_tests::*;
use mock_service::{MockConfig, MockServer};
use std::io::Write;

#[tokio::test]
#[ntest::timeout(10_000)]
async fn connect_opens_session_and_lists_cubes() {
    let server = MockServer::spawn(MockConfig {
        cubes: vec!["ReadTest".to_string(), "Sales".to_string()],
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let conn = Tm1Connection::connect(&server_config(&server)).await.unwrap();
    assert_eq!(conn.version(), "11.8.01300.1");
    assert!(conn.session_id().is_some_and(|id| id.starts_with("session-")));
    assert_eq!(conn.model_cubes().await.unwrap(), vec!["ReadTest", "Sales"]);

    let cells = conn.execute_mdx("SELECT FROM [ReadTest]").await.unwrap();
    assert_eq!(cells, 16);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn session_is_closed_when_the_run_fails() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();
    let conn = Tm1Connection::connect(&server_config(&server)).await.unwrap();

    let res: Result<(), String> = std::sync::Arc::new(conn)
        .with_session(|conn| async move {
            let _cubes = conn.model_cubes().await.unwrap();
            Err::<(), _>("export failed".to_string())
        })
        .await;

    assert_eq!(res, Err("export failed".to_string()));
    assert_eq!(server.stats().logouts, 1);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn session_is_closed_after_a_successful_run() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();
    let conn = Tm1Connection::connect(&server_config(&server)).await.unwrap();

    let cells = std::sync::Arc::new(conn)
        .with_session(|conn| async move { conn.execute_mdx("SELECT").await })
        .await
        .unwrap();

    assert_eq!(cells, 16);
    assert_eq!(server.stats().logouts, 1);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn bad_credentials_are_fatal() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();

    let res = Tm1Connection::connect(&server_config_with_password(&server, "wrong")).await;
    match res {
        Err(ConnectError::Rejected(status)) => assert_eq!(status.status.as_u16(), 401),
        other => panic!("expected rejection, got {:?}", other.err()),
    }
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn unreachable_server_is_fatal() {
    let config = {
        let server = MockServer::spawn(MockConfig::default()).await.unwrap();
        server_config(&server)
        // Server dropped here, port closed.
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let res = Tm1Connection::connect(&config).await;
    assert!(matches!(res, Err(ConnectError::Unreachable { .. })));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn empty_mdx_is_a_query_failure() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();
    let conn = Tm1Connection::connect(&server_config(&server)).await.unwrap();

    let outcome = run_single_query(&conn, "   ").await;
    match outcome.error() {
        Some(QueryError::Status(status)) => assert_eq!(status.status.as_u16(), 400),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn config_file_drives_a_run() {
    let server = MockServer::spawn(MockConfig::default()).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [run]
        levels = [1, 2, 3]
        settle_secs = 0
        replica = 4

        [tm1srv02]
        address = "ignored"
        port = 1
        user = "admin"
        password = "apple"
        base_url = "{}"
        "#,
        server.api_root()
    )
    .unwrap();

    let config = ConfigFile::load(file.path()).unwrap();
    config.run.validate().unwrap();
    let conn = Tm1Connection::connect(config.server("tm1srv02").unwrap())
        .await
        .unwrap();

    let table = Benchmark::new(std::sync::Arc::new(conn))
        .config(config.run.clone())
        .await;

    let queries: Vec<_> = table.iter().map(|r| r.queries).collect();
    assert_eq!(queries, vec![1, 2, 3]);
    assert!(table.iter().all(|r| r.replicas == 4 && r.failed == 0));
    assert_eq!(server.stats().executed, 6);
}
