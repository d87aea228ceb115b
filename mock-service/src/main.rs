use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockConfig;
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Mock TM1 REST server for load-test development")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0:3002")]
    addr: SocketAddr,

    /// Prometheus scrape endpoint.
    #[arg(long, default_value = "0.0.0.0:8002")]
    metrics_addr: SocketAddr,

    #[arg(long, default_value_t = 10)]
    delay_ms: u64,

    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    #[arg(long)]
    max_concurrent: Option<usize>,

    #[arg(long)]
    max_tps: Option<NonZeroU32>,

    #[arg(long)]
    fail_every: Option<NonZeroU64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    PrometheusBuilder::new()
        .with_http_listener(args.metrics_addr)
        .install()?;

    let config = MockConfig {
        delay: Duration::from_millis(args.delay_ms),
        jitter: Duration::from_millis(args.jitter_ms),
        max_concurrent: args.max_concurrent,
        max_tps: args.max_tps,
        fail_every: args.fail_every,
        ..MockConfig::default()
    };
    mock_service::run(args.addr, config).await?;
    Ok(())
}
