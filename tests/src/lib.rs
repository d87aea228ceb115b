//! Helpers shared by the end-to-end tests.
use cubeload_core::{ConfigFile, RunConfig, ServerConfig};
use mock_service::MockServer;
use std::num::NonZeroUsize;
use std::time::Duration;

pub fn server_config(server: &MockServer) -> ServerConfig {
    server_config_with_password(server, "apple")
}

pub fn server_config_with_password(server: &MockServer, password: &str) -> ServerConfig {
    let config: ConfigFile = format!(
        r#"
        [mock]
        address = "127.0.0.1"
        port = {port}
        user = "admin"
        password = "{password}"
        "#,
        port = server.addr().port(),
    )
    .parse()
    .expect("valid config");
    config.server("mock").expect("mock server").clone()
}

pub fn run_config(levels: &[usize]) -> RunConfig {
    RunConfig {
        levels: levels.iter().filter_map(|l| NonZeroUsize::new(*l)).collect(),
        settle: Duration::ZERO,
        ..RunConfig::default()
    }
}

pub fn read_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).expect("readable CSV");
    let header: Vec<_> = reader
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(header, ["Queries", "Replicas", "Time", "Partial", "Failed"]);

    reader
        .records()
        .map(|row| row.expect("row").iter().map(str::to_string).collect())
        .collect()
}
