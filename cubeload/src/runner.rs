//! Escalating-concurrency benchmark loop
use crate::connection::Connection;
use crate::measurement::RoundMeasurement;
use crate::query::{run_single_query, QueryError, QueryOutcome};
use cubeload_core::{ResultTable, RunConfig, DEFAULT_MDX};
use std::future::{Future, IntoFuture};
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Dispatch `level` concurrent invocations of the query and wait for all of them.
///
/// Always returns exactly `level` outcomes. Invocations still running once `wait_bound` has
/// elapsed are aborted and recorded as [`QueryError::TimedOut`]; a panicking invocation is
/// recorded as [`QueryError::Aborted`].
#[instrument(name = "round", skip_all, fields(level = level.get()))]
pub async fn run_batch<C: Connection>(
    level: NonZeroUsize,
    connection: &Arc<C>,
    mdx: &Arc<str>,
    wait_bound: Duration,
) -> Vec<QueryOutcome> {
    let tasks: Vec<_> = (0..level.get())
        .map(|_| {
            let connection = Arc::clone(connection);
            let mdx = Arc::clone(mdx);
            tokio::spawn(
                async move { run_single_query(connection.as_ref(), &mdx).await }
                    .in_current_span(),
            )
        })
        .collect();

    let deadline = deadline_after(wait_bound);
    let mut timed_out = 0;
    let mut outcomes = Vec::with_capacity(level.get());
    for mut handle in tasks {
        let outcome = match timeout_at(deadline, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!("Query task did not complete: {err}");
                QueryOutcome::Failed(QueryError::Aborted(err.to_string()))
            }
            Err(_) => {
                handle.abort();
                timed_out += 1;
                QueryOutcome::Failed(QueryError::TimedOut(wait_bound))
            }
        };
        outcomes.push(outcome);
    }

    if timed_out > 0 {
        warn!(
            "Round exceeded its wait bound of {}; aborted {timed_out} running queries.",
            humantime::format_duration(wait_bound)
        );
        debug!("Aborted queries may leave cellsets on the server.");
    }

    outcomes
}

/// Walk every level in order, one round each, and collect a record per round.
///
/// Rounds are never skipped: failures only show up in the records.
#[instrument(name = "benchmark", skip_all, fields(levels = run.levels.len()))]
pub async fn run_all_levels<C: Connection>(
    connection: Arc<C>,
    run: &RunConfig,
    mdx: &str,
) -> ResultTable {
    info!(
        "Running {} levels, settle delay {}",
        run.levels.len(),
        humantime::format_duration(run.settle)
    );

    let mdx: Arc<str> = Arc::from(mdx);
    let mut table = ResultTable::new();
    for &level in &run.levels {
        tokio::time::sleep(run.settle).await;

        let start = Instant::now();
        let outcomes = run_batch(level, &connection, &mdx, run.wait_bound).await;
        let elapsed = start.elapsed();

        let measurement = RoundMeasurement::new(level, elapsed, &outcomes);
        info!("{measurement}");

        #[cfg(feature = "metrics")]
        metrics::histogram!("cubeload.round.elapsed", "level" => level.to_string())
            .record(elapsed.as_secs_f64());

        table.push(measurement.record(run.replica));
        debug!("Results so far:\n{table}");
    }

    info!("Benchmark complete, {} failed queries", table.total_failed());
    table
}

/// Builder over [`run_all_levels`]. Awaiting it runs the benchmark.
///
/// # Example
/// ```no_run
/// use cubeload::prelude::*;
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn demo(connection: Tm1Connection) {
/// let levels: Vec<_> = [1, 2, 4].into_iter().filter_map(NonZeroUsize::new).collect();
/// let table = Benchmark::new(Arc::new(connection))
///     .levels(&levels)
///     .settle(Duration::from_secs(1))
///     .await;
/// println!("{table}");
/// # }
/// ```
pub struct Benchmark<C> {
    connection: Arc<C>,
    config: RunConfig,
    mdx: String,
}

impl<C: Connection> Benchmark<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            config: RunConfig::default(),
            mdx: DEFAULT_MDX.to_string(),
        }
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn levels(mut self, levels: &[NonZeroUsize]) -> Self {
        self.config.levels = levels.to_vec();
        self
    }

    pub fn replica(mut self, replica: u32) -> Self {
        self.config.replica = replica;
        self
    }

    /// Pause before each round.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.config.settle = settle;
        self
    }

    pub fn wait_bound(mut self, wait_bound: Duration) -> Self {
        self.config.wait_bound = wait_bound;
        self
    }

    pub fn mdx(mut self, mdx: impl Into<String>) -> Self {
        self.mdx = mdx.into();
        self
    }
}

impl<C: Connection> IntoFuture for Benchmark<C> {
    type Output = ResultTable;
    type IntoFuture = Pin<Box<dyn Future<Output = ResultTable> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { run_all_levels(self.connection, &self.config, &self.mdx).await })
    }
}

fn deadline_after(wait_bound: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait_bound)
        // Roughly 30 years, same as tokio's own "never".
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}
