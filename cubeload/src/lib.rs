//! Escalating-concurrency load testing for OLAP MDX query endpoints.
//!
//! For each concurrency level the runner dispatches that many identical queries against one
//! shared [`Connection`], times the whole batch, counts failed invocations and appends a
//! [`ResultRecord`] to the [`ResultTable`] that is exported as CSV at the end of the run.
pub mod cli;
pub mod connection;
pub mod export;
pub mod measurement;
pub mod query;
pub mod runner;
pub mod tm1;

pub use connection::Connection;
pub use cubeload_core::{ConfigFile, ResultRecord, ResultTable, RunConfig, ServerConfig};
pub use query::{QueryError, QueryOutcome};
pub use runner::Benchmark;

pub mod prelude {
    pub use crate::connection::Connection;
    pub use crate::query::{run_single_query, QueryError, QueryOutcome};
    pub use crate::runner::{run_all_levels, run_batch, Benchmark};
    pub use crate::tm1::Tm1Connection;
    pub use cubeload_core::{ResultRecord, ResultTable, RunConfig};
}
