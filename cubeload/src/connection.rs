use crate::query::QueryError;
use std::future::Future;

/// A session against the query endpoint, shared by every invocation of a run.
///
/// Implementations must tolerate concurrent calls; the runner holds the connection in an `Arc`
/// and places no lock around it.
pub trait Connection: Send + Sync + 'static {
    /// Execute `mdx` and return the number of cells in the resulting cellset.
    fn execute_mdx(&self, mdx: &str) -> impl Future<Output = Result<u64, QueryError>> + Send;
}
