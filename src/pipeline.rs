//! One report run: load inputs, normalize, compute every store, publish the artifact.

use crate::error::AppError;
use crate::output::ReportFile;
use crate::source::ReportSource;
use crate::state::{AppState, RunId};
use crate::uptime::business_hours::BusinessHours;
use crate::uptime::observation::{TimezoneTable, normalize};
use crate::uptime::report::Report;
use crate::uptime::{EngineParams, build_report};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::{Instant, SystemTime};
use tracing::{info, warn};

/// Everything a run needs besides the shared state.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub params: EngineParams,
    pub reference: DateTime<Utc>,
    pub output: ReportFile,
}

/// Loads inputs from `source` and computes the report. Nothing is published.
pub fn compute_report(
    source: &dyn ReportSource,
    params: &EngineParams,
    reference: DateTime<Utc>,
) -> Result<Report, AppError> {
    let inputs = source.load()?;
    let timezones = TimezoneTable::from_rows(&inputs.timezones, params.default_timezone);
    let hours = BusinessHours::from_rows(&inputs.business_hours, params.full_day);
    let observations = normalize(&inputs.status, &timezones);

    if observations.stats.dropped() > 0 {
        warn!(
            malformed_timestamps = observations.stats.malformed_timestamps,
            unknown_statuses = observations.stats.unknown_statuses,
            "Some observations were dropped"
        );
    }
    info!(
        stores = observations.stores.len(),
        observations = observations.stats.kept,
        reference = %reference,
        "Observations normalized"
    );

    Ok(build_report(&observations, &hours, params, reference)?)
}

/// Runs report `run_id` to completion and records the outcome.
///
/// The report is written to a staging file outside the state lock. Only the rename over the
/// artifact and the status update happen under the write lock, and only while `run_id` is
/// still the latest run, so readers never see one without the other.
pub fn run_report(
    state: &Arc<RwLock<AppState>>,
    source: &dyn ReportSource,
    settings: &ReportSettings,
    run_id: RunId,
) -> Result<bool, AppError> {
    let started = Instant::now();
    let staged = compute_report(source, &settings.params, settings.reference)
        .and_then(|report| Ok(settings.output.stage(&report, run_id)?));

    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    if !guard.is_current(run_id) {
        drop(guard);
        info!(run_id, "Discarding result of superseded run");
        if let Ok(staged) = staged {
            if let Err(err) = staged.discard() {
                warn!(run_id, error = %err, "Failed to remove staged report");
            }
        }
        return Ok(false);
    }

    let published = staged.and_then(|staged| {
        let stores = staged.stores();
        staged.commit()?;
        Ok(stores)
    });
    match published {
        Ok(stores) => {
            guard.complete_run(run_id, SystemTime::now(), stores);
            info!(
                run_id,
                stores,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Report run completed"
            );
            Ok(true)
        }
        Err(err) => {
            guard.fail_run(run_id, SystemTime::now(), err.to_string());
            Err(err)
        }
    }
}

/// Removes the previous artifact and registers a new run.
pub fn begin_run(
    state: &Arc<RwLock<AppState>>,
    settings: &ReportSettings,
) -> Result<RunId, AppError> {
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    settings.output.remove()?;
    let run_id = guard.begin_run(SystemTime::now());
    info!(run_id, "Report run started");
    Ok(run_id)
}

/// Starts a run on tokio's blocking pool and returns its id immediately.
pub fn spawn_report_run(
    state: Arc<RwLock<AppState>>,
    source: Arc<dyn ReportSource>,
    settings: Arc<ReportSettings>,
) -> Result<RunId, AppError> {
    let run_id = begin_run(&state, &settings)?;
    tokio::task::spawn_blocking(move || {
        if let Err(err) = run_report(&state, source.as_ref(), &settings, run_id) {
            warn!(run_id, error = %err, "Report run failed");
        }
    });
    Ok(run_id)
}
