use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Summary of one concurrency round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(rename = "Queries")]
    pub queries: usize,
    #[serde(rename = "Replicas")]
    pub replicas: u32,
    /// Batch wall-clock time in seconds.
    #[serde(rename = "Time")]
    pub time: f64,
    /// At least one invocation in the round failed.
    #[serde(rename = "Partial")]
    pub partial: bool,
    #[serde(rename = "Failed")]
    pub failed: usize,
}

impl ResultRecord {
    pub fn new(level: NonZeroUsize, replicas: u32, elapsed: Duration, failed: usize) -> Self {
        Self {
            queries: level.get(),
            replicas,
            time: elapsed.as_secs_f64(),
            partial: failed > 0,
            failed,
        }
    }
}

/// Records in the order the levels were tested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<ResultRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    pub fn total_failed(&self) -> usize {
        self.records.iter().map(|r| r.failed).sum()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>7} {:>8} {:>12.6} {:>7} {:>6}",
            self.queries, self.replicas, self.time, self.partial, self.failed
        )
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>7} {:>8} {:>12} {:>7} {:>6}",
            "Queries", "Replicas", "Time", "Partial", "Failed"
        )?;
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}
