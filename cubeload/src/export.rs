use cubeload_core::ResultTable;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const HEADER: [&str; 5] = ["Queries", "Replicas", "Time", "Partial", "Failed"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unable to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to write results file: {0}")]
    Io(#[from] io::Error),
}

/// `results-<unix seconds>.csv`, fractional seconds included.
pub fn results_file_name(at: SystemTime) -> String {
    let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("results-{:.6}.csv", since_epoch.as_secs_f64())
}

/// Write the header and one row per record. The header is written even for an empty table.
pub fn write_csv<W: io::Write>(writer: W, table: &ResultTable) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(HEADER)?;
    for record in table {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `table` to a freshly timestamped file in `dir`, returning its path.
pub fn export_csv(dir: &Path, table: &ResultTable) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(results_file_name(SystemTime::now()));
    let file = std::fs::File::create(&path)?;
    write_csv(io::BufWriter::new(file), table)?;
    Ok(path)
}
