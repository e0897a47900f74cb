//! Report inputs: raw status, business-hours and timezone rows.
//!
//! The relational store itself lives elsewhere; this service consumes the cached CSV extracts
//! of its three tables. `ReportSource` is the seam between the two.

use crate::uptime::observation::StoreId;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusRow {
    pub store_id: StoreId,
    pub status: String,
    pub timestamp_utc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusinessHoursRow {
    pub store_id: StoreId,
    /// 0 = Monday … 6 = Sunday
    pub day: u8,
    pub start_time_local: String,
    pub end_time_local: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimezoneRow {
    pub store_id: StoreId,
    pub timezone_str: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    pub status: Vec<StatusRow>,
    pub business_hours: Vec<BusinessHoursRow>,
    pub timezones: Vec<TimezoneRow>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Supplies the rows of one report run. Failures are fatal to the run.
pub trait ReportSource: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<ReportInputs, SourceError>;
}

/// Reads the three table extracts from CSV files with a header row.
///
/// Columns not named by the row types (e.g. a leading index column) are ignored.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub status_path: PathBuf,
    pub business_hours_path: PathBuf,
    pub timezones_path: PathBuf,
}

impl CsvSource {
    pub fn new(
        status_path: impl Into<PathBuf>,
        business_hours_path: impl Into<PathBuf>,
        timezones_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            status_path: status_path.into(),
            business_hours_path: business_hours_path.into(),
            timezones_path: timezones_path.into(),
        }
    }
}

impl ReportSource for CsvSource {
    fn load(&self) -> Result<ReportInputs, SourceError> {
        let inputs = ReportInputs {
            status: read_rows(&self.status_path)?,
            business_hours: read_rows(&self.business_hours_path)?,
            timezones: read_rows(&self.timezones_path)?,
        };
        info!(
            status_rows = inputs.status.len(),
            business_hours_rows = inputs.business_hours.len(),
            timezone_rows = inputs.timezones.len(),
            "Report inputs loaded"
        );
        Ok(inputs)
    }
}

fn read_rows<T>(path: &Path) -> Result<Vec<T>, SourceError>
where
    T: for<'de> Deserialize<'de>,
{
    let file = std::fs::File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row = record.map_err(|source| SourceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Inputs held in memory, handed out unchanged on every load.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inputs: ReportInputs,
}

impl MemorySource {
    pub fn new(inputs: ReportInputs) -> Self {
        Self { inputs }
    }
}

impl ReportSource for MemorySource {
    fn load(&self) -> Result<ReportInputs, SourceError> {
        Ok(self.inputs.clone())
    }
}
