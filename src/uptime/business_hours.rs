//! Weekly open hours, anchored to concrete local dates.

use crate::source::BusinessHoursRow;
use crate::uptime::observation::StoreId;
use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::warn;

pub const LOCAL_TIME_FORMAT: &str = "%H:%M:%S";
/// Sunday, counting Monday as 0.
const MAX_WEEKDAY: u8 = 6;

/// An open interval anchored to one calendar date in store-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInterval {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl OpenInterval {
    pub fn minutes(&self) -> f64 {
        super::minutes_between(self.start, self.end)
    }

    /// Strict interior containment; boundary instants belong to no interval.
    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        self.start < *instant && *instant < self.end
    }
}

/// Wall-clock bounds used for a weekday with no configured hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullDayHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for FullDayHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BusinessHours {
    weekly: HashMap<(StoreId, u32), Vec<(NaiveTime, NaiveTime)>>,
    full_day: FullDayHours,
}

impl BusinessHours {
    /// Builds the weekly schedule. Rows with an unparsable time, a weekday outside 0..=6 or
    /// `start >= end` are skipped with a warning. A weekday whose rows were all skipped stays
    /// configured with no open intervals.
    pub fn from_rows(rows: &[BusinessHoursRow], full_day: FullDayHours) -> Self {
        let mut weekly: HashMap<(StoreId, u32), Vec<(NaiveTime, NaiveTime)>> = HashMap::new();
        for row in rows {
            let parsed = parse_row(row);
            if row.day <= MAX_WEEKDAY {
                let intervals = weekly.entry((row.store_id, u32::from(row.day))).or_default();
                if let Some(interval) = parsed {
                    intervals.push(interval);
                    continue;
                }
            }
            warn!(
                store_id = row.store_id,
                day = row.day,
                start = %row.start_time_local,
                end = %row.end_time_local,
                "Skipping invalid business hours row"
            );
        }
        for intervals in weekly.values_mut() {
            intervals.sort();
        }
        Self { weekly, full_day }
    }

    /// Open intervals of `store_id` on `date`, anchored in `zone`.
    ///
    /// A weekday without configured rows is open for the whole day. A weekday with rows that
    /// were all invalid has no open intervals.
    pub fn open_intervals(
        &self,
        store_id: StoreId,
        date: NaiveDate,
        zone: Tz,
    ) -> Vec<OpenInterval> {
        let weekday = date.weekday().num_days_from_monday();
        let anchor = |start: NaiveTime, end: NaiveTime| OpenInterval {
            start: localize(zone, date.and_time(start)),
            end: localize(zone, date.and_time(end)),
        };

        match self.weekly.get(&(store_id, weekday)) {
            Some(intervals) => intervals
                .iter()
                .map(|&(start, end)| anchor(start, end))
                .collect(),
            None => vec![anchor(self.full_day.start, self.full_day.end)],
        }
    }
}

fn parse_row(row: &BusinessHoursRow) -> Option<(NaiveTime, NaiveTime)> {
    if row.day > MAX_WEEKDAY {
        return None;
    }
    let start = NaiveTime::parse_from_str(row.start_time_local.trim(), LOCAL_TIME_FORMAT).ok()?;
    let end = NaiveTime::parse_from_str(row.end_time_local.trim(), LOCAL_TIME_FORMAT).ok()?;
    (start < end).then_some((start, end))
}

/// Attaches `zone` to a wall-clock time. Ambiguous times take the later (standard-time)
/// offset; times skipped by a DST jump move forward by the gap.
fn localize(zone: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(_, later) => later,
        LocalResult::None => {
            let shifted = naive + TimeDelta::hours(1);
            match zone.from_local_datetime(&shifted) {
                LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => instant,
                LocalResult::None => zone.from_utc_datetime(&naive),
            }
        }
    }
}
