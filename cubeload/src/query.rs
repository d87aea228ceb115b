use crate::connection::Connection;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, trace};

/// Non-success HTTP response, with whatever body the server sent back.
#[derive(Debug, Error)]
#[error("Server responded with {status}: {body}")]
pub struct StatusError {
    pub status: StatusCode,
    pub body: String,
}

impl StatusError {
    /// Pass successful responses through, turn everything else into a `StatusError`.
    pub async fn check(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self { status, body })
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Query still running after {}", humantime::format_duration(*.0))]
    TimedOut(Duration),

    #[error("Query task aborted: {0}")]
    Aborted(String),
}

/// Result of a single query invocation. Failures are data, not errors.
#[derive(Debug)]
pub enum QueryOutcome {
    Success(Duration),
    Failed(QueryError),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            QueryOutcome::Success(elapsed) => Some(*elapsed),
            QueryOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            QueryOutcome::Success(_) => None,
            QueryOutcome::Failed(error) => Some(error),
        }
    }
}

/// Run `mdx` once and time it, from just before dispatch until the result is in hand.
pub async fn run_single_query<C: Connection>(connection: &C, mdx: &str) -> QueryOutcome {
    let start = Instant::now();
    let res = connection.execute_mdx(mdx).await;
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    metrics::histogram!("cubeload.query.latency").record(elapsed.as_secs_f64());

    match res {
        Ok(cells) => {
            trace!("Query returned {cells} cells in {elapsed:?}");
            #[cfg(feature = "metrics")]
            metrics::counter!("cubeload.query.success").increment(1);
            QueryOutcome::Success(elapsed)
        }
        Err(error) => {
            debug!("Query failed after {elapsed:?}: {error}");
            #[cfg(feature = "metrics")]
            metrics::counter!("cubeload.query.error").increment(1);
            QueryOutcome::Failed(error)
        }
    }
}
