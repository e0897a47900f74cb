use crate::uptime::day::DayAggregate;
use crate::uptime::observation::StoreId;
use crate::uptime::window::WindowTotals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uptime and downtime of one store over the three trailing windows, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreReport {
    pub store_id: StoreId,
    pub uptime_last_hour: f64,
    pub downtime_last_hour: f64,
    pub uptime_last_day: f64,
    pub downtime_last_day: f64,
    pub uptime_last_week: f64,
    pub downtime_last_week: f64,
}

impl StoreReport {
    pub fn new(store_id: StoreId, hour: DayAggregate, windows: WindowTotals) -> Self {
        Self {
            store_id,
            uptime_last_hour: hour.active_minutes,
            downtime_last_hour: hour.inactive_minutes,
            uptime_last_day: windows.day.active_minutes,
            downtime_last_day: windows.day.inactive_minutes,
            uptime_last_week: windows.week.active_minutes,
            downtime_last_week: windows.week.inactive_minutes,
        }
    }

    pub fn empty(store_id: StoreId) -> Self {
        Self {
            store_id,
            ..Self::default()
        }
    }
}

/// One finished report run, rows ordered by store id.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub reference: DateTime<Utc>,
    pub rows: Vec<StoreReport>,
}

impl Report {
    pub fn store(&self, store_id: StoreId) -> Option<&StoreReport> {
        self.rows
            .binary_search_by_key(&store_id, |row| row.store_id)
            .ok()
            .map(|index| &self.rows[index])
    }
}

/// Serializes rows as CSV with a header row, even when `rows` is empty.
pub fn write_csv<'a, W, I>(writer: W, rows: I) -> Result<W, csv::Error>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a StoreReport>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Vec<StoreReport>, csv::Error> {
    csv::Reader::from_reader(reader).into_deserialize().collect()
}

pub const CSV_HEADER: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "downtime_last_hour",
    "uptime_last_day",
    "downtime_last_day",
    "uptime_last_week",
    "downtime_last_week",
];
