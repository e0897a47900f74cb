//! Uptime estimation engine.
//!
//! Turns sparse status observations and a weekly open-hours schedule into per-store
//! uptime/downtime minutes over the last hour, day and week before a reference instant.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::num::NonZeroUsize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

pub mod business_hours;
pub mod day;
pub mod observation;
pub mod report;
pub mod window;

use business_hours::{BusinessHours, FullDayHours};
use observation::{ObservationSet, StoreId, StoreObservations};
use report::{Report, StoreReport};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;
/// Stores silent for longer than this many days before the reference report zeros.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 6;

/// Tunables of one report run.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Zone for stores without a timezone assignment.
    pub default_timezone: Tz,
    pub lookback_days: u32,
    pub full_day: FullDayHours,
    /// Upper bound on threads computing stores in parallel.
    pub workers: NonZeroUsize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            full_day: FullDayHours::default(),
            workers: default_workers(),
        }
    }
}

pub fn default_workers() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("store worker panicked")]
    WorkerPanicked,
}

/// Minutes between two instants, fractional, negative if `end` precedes `start`.
pub fn minutes_between<Z: TimeZone>(start: DateTime<Z>, end: DateTime<Z>) -> f64 {
    let delta = end - start;
    (delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9) / 60.0
}

/// Computes the report row of a single store.
pub fn store_report(
    store_id: StoreId,
    store: &StoreObservations,
    hours: &BusinessHours,
    reference: DateTime<Utc>,
    lookback_days: u32,
) -> StoreReport {
    let windows = window::aggregate(store_id, store, hours, reference, lookback_days);
    let hour = window::last_hour(store, reference);
    StoreReport::new(store_id, hour, windows)
}

/// Computes one row per store in `observations`, fanning stores out over worker threads.
///
/// Stores are independent and only read shared inputs, so rows are identical whatever the
/// worker count. Rows come back ordered by store id.
pub fn build_report(
    observations: &ObservationSet,
    hours: &BusinessHours,
    params: &EngineParams,
    reference: DateTime<Utc>,
) -> Result<Report, ReportError> {
    let started = Instant::now();
    let stores: Vec<(&StoreId, &StoreObservations)> = observations.stores.iter().collect();
    let workers = params.workers.get().min(stores.len()).max(1);
    let chunk_size = stores.len().div_ceil(workers).max(1);
    debug!(stores = stores.len(), workers, "Computing store reports");

    let rows = std::thread::scope(|scope| {
        let handles: Vec<_> = stores
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&(&store_id, store)| {
                            store_report(store_id, store, hours, reference, params.lookback_days)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut rows = Vec::with_capacity(stores.len());
        for handle in handles {
            let chunk_rows = handle.join().map_err(|_| ReportError::WorkerPanicked)?;
            rows.extend(chunk_rows);
        }
        Ok::<_, ReportError>(rows)
    })?;

    info!(
        stores = rows.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Report computed"
    );
    Ok(Report { reference, rows })
}
