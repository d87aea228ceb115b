//! Command line arguments for the `cubeload` binary.
use clap::Parser;
use cubeload_core::{RunConfig, DEFAULT_CONFIG_PATH, DEFAULT_MDX, DEFAULT_SERVER};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Flags left unset fall back to the `[run]` table of the config file.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Runs an MDX query at escalating concurrency levels and writes a CSV summary"
)]
pub struct Cli {
    /// TOML file holding server connection parameters.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Server table to connect with.
    #[arg(short, long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Comma separated concurrency levels, e.g. `1,5,10`.
    #[arg(short, long, value_delimiter = ',')]
    pub levels: Option<Vec<NonZeroUsize>>,

    /// Replica identifier written to every row.
    #[arg(short, long)]
    pub replica: Option<u32>,

    /// Pause before each round, e.g. `2s`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub settle: Option<Duration>,

    /// Upper bound on one round, e.g. `15m`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait_bound: Option<Duration>,

    /// File containing the MDX to run instead of the built-in query.
    #[arg(long)]
    pub mdx_file: Option<PathBuf>,

    /// Directory the results CSV is written to.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn apply(&self, run: &mut RunConfig) {
        if let Some(levels) = &self.levels {
            run.levels = levels.clone();
        }
        if let Some(replica) = self.replica {
            run.replica = replica;
        }
        if let Some(settle) = self.settle {
            run.settle = settle;
        }
        if let Some(wait_bound) = self.wait_bound {
            run.wait_bound = wait_bound;
        }
        if let Some(output_dir) = &self.output_dir {
            run.output_dir = output_dir.clone();
        }
    }

    pub fn mdx(&self) -> std::io::Result<String> {
        match &self.mdx_file {
            Some(path) => std::fs::read_to_string(path),
            None => Ok(DEFAULT_MDX.to_string()),
        }
    }
}
