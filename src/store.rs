//! Append-only CSV telemetry log.
//!
//! One line per snapshot, header row on first write only. Appends are a
//! single buffered write followed by a flush, so a reader either sees a
//! whole line or a trailing fragment; fragments and hand-edited garbage are
//! skipped on read rather than poisoning the series.

use std::fs::OpenOptions;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::api::VehicleSnapshot;

const HEADER: [&str; 7] = [
    "timestamp",
    "charge_percent",
    "odometer",
    "battery_health_percent",
    "range_estimate",
    "latitude",
    "longitude",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open telemetry log {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append to telemetry log: {0}")]
    Append(#[from] csv::Error),

    #[error("failed to flush telemetry log: {0}")]
    Flush(#[from] std::io::Error),
}

/// Handle on the telemetry log file. Cheap to clone; every operation opens
/// the file fresh, which keeps the single-writer/many-reader split trivial.
#[derive(Clone)]
pub struct TelemetryLog {
    path: PathBuf,
}

impl TelemetryLog {
    pub fn new(path: PathBuf) -> Self {
        TelemetryLog { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one snapshot as one CSV line, writing the header first if the
    /// file is new or empty.
    pub fn append(&self, snapshot: &VehicleSnapshot) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        let needs_header = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }

        writer.serialize(snapshot)?;
        writer.flush()?;

        debug!(path = %self.path.display(), timestamp = %snapshot.timestamp, "appended snapshot");
        Ok(())
    }

    /// Read the whole series in insertion order. Unparsable lines (torn
    /// tail after a crash, manual edits) are skipped.
    pub fn read_all(&self) -> Result<Vec<VehicleSnapshot>, StoreError> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Open {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let mut snapshots = Vec::new();
        for record in reader.deserialize::<VehicleSnapshot>() {
            match record {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => debug!(error = %e, "skipping unparsable log line"),
            }
        }

        Ok(snapshots)
    }

    /// Most recent snapshot, if any data has been written yet.
    pub fn latest(&self) -> Result<Option<VehicleSnapshot>, StoreError> {
        Ok(self.read_all()?.pop())
    }
}
