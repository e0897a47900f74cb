//! The persisted report artifact.
//!
//! Readers gate on the artifact's presence: it exists only once a run has finished, and it is
//! always replaced whole by writing a sibling file and renaming it into place.

use crate::uptime::observation::StoreId;
use crate::uptime::report::{self, Report, StoreReport};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_OUTPUT_PATH: &str = "cache/result.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("report file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("report CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone)]
pub struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replaces the artifact with `report`.
    pub fn publish(&self, report: &Report) -> Result<(), OutputError> {
        self.stage(report, 0)?.commit()
    }

    /// Writes `report` next to the artifact without replacing it. `tag` keeps concurrent
    /// stagings apart.
    pub fn stage(&self, report: &Report, tag: u64) -> Result<StagedReport, OutputError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = self.staging_path(tag);
        let file = fs::File::create(&staging)?;
        let mut writer = report::write_csv(BufWriter::new(file), &report.rows)?;
        writer.flush()?;
        drop(writer);

        Ok(StagedReport {
            staging,
            target: self.path.clone(),
            stores: report.rows.len(),
        })
    }

    /// Removes the artifact. A missing artifact is not an error.
    pub fn remove(&self) -> Result<(), OutputError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn read_rows(&self) -> Result<Vec<StoreReport>, OutputError> {
        let file = fs::File::open(&self.path)?;
        Ok(report::read_csv(io::BufReader::new(file))?)
    }

    /// CSV extract of the artifact, optionally narrowed to one store. The header row is
    /// always present.
    pub fn extract(&self, store_id: Option<StoreId>) -> Result<Vec<u8>, OutputError> {
        let rows = self.read_rows()?;
        let selected = rows
            .iter()
            .filter(|row| store_id.is_none_or(|id| row.store_id == id));
        Ok(report::write_csv(Vec::new(), selected)?)
    }

    fn staging_path(&self, tag: u64) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{tag}.tmp"));
        self.path.with_file_name(name)
    }
}

/// A fully written report waiting to be renamed over the artifact.
#[derive(Debug)]
pub struct StagedReport {
    staging: PathBuf,
    target: PathBuf,
    stores: usize,
}

impl StagedReport {
    pub fn stores(&self) -> usize {
        self.stores
    }

    /// Renames the staged file into place.
    pub fn commit(self) -> Result<(), OutputError> {
        fs::rename(&self.staging, &self.target)?;
        info!(
            path = %self.target.display(),
            stores = self.stores,
            "Report published"
        );
        Ok(())
    }

    pub fn discard(self) -> Result<(), OutputError> {
        match fs::remove_file(&self.staging) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
