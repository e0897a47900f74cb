//! Observation normalization.
//!
//! Raw status rows carry a UTC timestamp as text and a status string. This module parses both,
//! resolves each store's IANA timezone and returns every store's observations in store-local
//! time, sorted ascending.

use crate::source::{StatusRow, TimezoneRow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::warn;

pub type StoreId = i64;

/// Whole-second format, e.g. `2023-01-24 09:07:26 UTC`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Fractional-second format, e.g. `2023-01-24 09:07:26.441407 UTC`.
pub const TIMESTAMP_FORMAT_FRACTIONAL: &str = "%Y-%m-%d %H:%M:%S%.f";

const UTC_SUFFIX: &str = "UTC";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObservationError {
    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),
    #[error("unknown status: {0:?}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreState {
    Active,
    Inactive,
}

impl StoreState {
    pub fn parse(raw: &str) -> Result<Self, ObservationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ObservationError::UnknownStatus(raw.to_string())),
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub store_id: StoreId,
    pub local: DateTime<Tz>,
    pub state: StoreState,
}

/// Observations of a single store, ascending by time.
#[derive(Debug, Clone)]
pub struct StoreObservations {
    pub timezone: Tz,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub kept: usize,
    pub malformed_timestamps: usize,
    pub unknown_statuses: usize,
}

impl NormalizeStats {
    pub fn dropped(&self) -> usize {
        self.malformed_timestamps + self.unknown_statuses
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    pub stores: BTreeMap<StoreId, StoreObservations>,
    pub stats: NormalizeStats,
}

/// Parses a UTC timestamp in either accepted text format. A trailing `UTC` zone label is optional.
pub fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>, ObservationError> {
    let trimmed = raw.trim();
    let text = trimmed
        .strip_suffix(UTC_SUFFIX)
        .map(str::trim_end)
        .unwrap_or(trimmed);

    [TIMESTAMP_FORMAT, TIMESTAMP_FORMAT_FRACTIONAL]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ObservationError::MalformedTimestamp(raw.to_string()))
}

/// Store → zone lookup. The first assignment for a store wins.
#[derive(Debug, Clone)]
pub struct TimezoneTable {
    zones: HashMap<StoreId, Tz>,
    default_zone: Tz,
}

impl TimezoneTable {
    pub fn from_rows(rows: &[TimezoneRow], default_zone: Tz) -> Self {
        let mut zones = HashMap::with_capacity(rows.len());
        for row in rows {
            if zones.contains_key(&row.store_id) {
                continue;
            }
            match row.timezone_str.trim().parse::<Tz>() {
                Ok(zone) => {
                    zones.insert(row.store_id, zone);
                }
                Err(_) => {
                    warn!(
                        store_id = row.store_id,
                        timezone = %row.timezone_str,
                        "Unknown timezone, store will use the default zone"
                    );
                }
            }
        }
        Self {
            zones,
            default_zone,
        }
    }

    pub fn zone_for(&self, store_id: StoreId) -> Tz {
        self.zones
            .get(&store_id)
            .copied()
            .unwrap_or(self.default_zone)
    }
}

/// Groups raw status rows per store, converted to each store's local time and sorted.
///
/// Rows with a malformed timestamp or an unknown status are dropped with a warning.
pub fn normalize(rows: &[StatusRow], timezones: &TimezoneTable) -> ObservationSet {
    let mut set = ObservationSet::default();

    for row in rows {
        let parsed = parse_utc_timestamp(&row.timestamp_utc)
            .and_then(|instant| StoreState::parse(&row.status).map(|state| (instant, state)));
        let (instant, state) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                match &err {
                    ObservationError::MalformedTimestamp(_) => {
                        set.stats.malformed_timestamps += 1
                    }
                    ObservationError::UnknownStatus(_) => set.stats.unknown_statuses += 1,
                }
                warn!(store_id = row.store_id, error = %err, "Dropping observation");
                continue;
            }
        };

        let store = set
            .stores
            .entry(row.store_id)
            .or_insert_with(|| StoreObservations {
                timezone: timezones.zone_for(row.store_id),
                observations: Vec::new(),
            });
        store.observations.push(Observation {
            store_id: row.store_id,
            local: instant.with_timezone(&store.timezone),
            state,
        });
        set.stats.kept += 1;
    }

    for store in set.stores.values_mut() {
        store.observations.sort_by_key(|observation| observation.local);
    }

    set
}
