use crate::query::QueryOutcome;
use cubeload_core::ResultRecord;
use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Aggregate of one round: batch time, failure count and per-query latency quantiles.
#[derive(Debug, Clone)]
pub struct RoundMeasurement {
    pub level: NonZeroUsize,
    pub elapsed: Duration,
    pub success: usize,
    pub failed: usize,
    latency: TDigest<K1>,
}

impl RoundMeasurement {
    pub fn new(level: NonZeroUsize, elapsed: Duration, outcomes: &[QueryOutcome]) -> Self {
        let mut latency = default_tdigest();
        let mut success = 0;
        let mut failed = 0;
        for outcome in outcomes {
            match outcome.elapsed() {
                Some(dur) => {
                    success += 1;
                    latency.insert(dur.as_secs_f64());
                }
                None => failed += 1,
            }
        }

        Self {
            level,
            elapsed,
            success,
            failed,
            latency,
        }
    }

    /// Any failed invocation marks the round partial.
    pub fn partial(&self) -> bool {
        self.failed > 0
    }

    /// Latency quantile over the successful invocations, `None` if there were none.
    pub fn latency(&self, quantile: f64) -> Option<Duration> {
        if self.success == 0 {
            return None;
        }

        let secs = self.latency.quantile(quantile);
        if secs.is_finite() {
            Some(Duration::from_secs_f64(secs.max(0.)))
        } else {
            error!("Non-finite latency quantile for level {}", self.level);
            None
        }
    }

    pub fn record(&self, replicas: u32) -> ResultRecord {
        ResultRecord::new(self.level, replicas, self.elapsed, self.failed)
    }
}

impl fmt::Display for RoundMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queries={}, Time={:.3}s, Failed={}",
            self.level,
            self.elapsed.as_secs_f64(),
            self.failed,
        )?;
        match (self.latency(0.5), self.latency(0.9), self.latency(0.99)) {
            (Some(p50), Some(p90), Some(p99)) => {
                write!(f, ", p50={p50:?}, p90={p90:?}, p99={p99:?}")
            }
            _ => Ok(()),
        }
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
