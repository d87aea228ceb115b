use anyhow::Context;
use clap::Parser;
use cubeload::cli::Cli;
use cubeload::export::export_csv;
use cubeload::prelude::*;
use cubeload::ConfigFile;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ConfigFile::load(&cli.config)?;
    let server = config.server(&cli.server)?;
    let mut run = config.run.clone();
    cli.apply(&mut run);
    run.validate()?;
    let mdx = cli.mdx().context("Unable to read MDX file")?;

    let connection = Tm1Connection::connect(server)
        .await
        .with_context(|| format!("Unable to connect to `{}`", cli.server))?;

    Arc::new(connection)
        .with_session(|connection| run_benchmark(connection, run, mdx))
        .await
}

async fn run_benchmark(
    connection: Arc<Tm1Connection>,
    run: RunConfig,
    mdx: String,
) -> anyhow::Result<()> {
    let cubes = connection.model_cubes().await?;
    info!("Model cubes: {cubes:?}");

    let output_dir = run.output_dir.clone();
    let table = Benchmark::new(connection).config(run).mdx(mdx).await;
    println!("{table}");

    let path = export_csv(&output_dir, &table)?;
    info!("Results written to {}", path.display());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("cubeload=debug,cubeload_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cubeload=info,cubeload_core=info"))
    };
    FmtSubscriber::builder().with_env_filter(filter).init();
}
