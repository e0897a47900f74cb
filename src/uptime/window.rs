//! Trailing windows anchored at a reference instant: last hour, last day, last week.

use crate::uptime::business_hours::BusinessHours;
use crate::uptime::day::{DayAggregate, estimate_day};
use crate::uptime::observation::{Observation, StoreId, StoreObservations};
use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};

/// Days summed into the week window, the most recent day with data included.
pub const WEEK_DAYS: u64 = 7;
pub const HOUR_MINUTES: f64 = 60.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowTotals {
    pub week: DayAggregate,
    pub day: DayAggregate,
}

/// Observations of `store` whose local calendar date is `date`, still ascending.
pub fn observations_on(store: &StoreObservations, date: NaiveDate) -> Vec<Observation> {
    store
        .observations
        .iter()
        .filter(|observation| observation.local.date_naive() == date)
        .cloned()
        .collect()
}

fn has_observations_on(store: &StoreObservations, date: NaiveDate) -> bool {
    store
        .observations
        .iter()
        .any(|observation| observation.local.date_naive() == date)
}

/// Finds the most recent local day with observations, starting at the reference day and
/// stepping back at most `lookback_days` days.
pub fn latest_day_with_data(
    store: &StoreObservations,
    reference: DateTime<Utc>,
    lookback_days: u32,
) -> Option<NaiveDate> {
    let anchor = reference.with_timezone(&store.timezone).date_naive();
    (0..=u64::from(lookback_days))
        .map_while(|step| anchor.checked_sub_days(Days::new(step)))
        .find(|date| has_observations_on(store, *date))
}

/// Day and week totals. The day window is the latest day with data; the week window is that
/// day plus the six calendar days before it, each estimated with its own weekday's hours.
/// A store silent for the whole lookback yields zeros.
pub fn aggregate(
    store_id: StoreId,
    store: &StoreObservations,
    hours: &BusinessHours,
    reference: DateTime<Utc>,
    lookback_days: u32,
) -> WindowTotals {
    let Some(latest) = latest_day_with_data(store, reference, lookback_days) else {
        return WindowTotals::default();
    };

    let estimate = |date: NaiveDate| {
        let intervals = hours.open_intervals(store_id, date, store.timezone);
        estimate_day(&observations_on(store, date), &intervals)
    };

    let day = estimate(latest);
    let week = (1..WEEK_DAYS)
        .filter_map(|step| latest.checked_sub_days(Days::new(step)))
        .map(estimate)
        .fold(day, |total, earlier| total + earlier);

    WindowTotals { week, day }
}

/// Classifies the whole last hour by one sample: the first observation on the reference's
/// local date whose hour is the reference hour or the one before.
pub fn last_hour(store: &StoreObservations, reference: DateTime<Utc>) -> DayAggregate {
    let local = reference.with_timezone(&store.timezone);
    let date = local.date_naive();
    let hour = local.hour();
    // Midnight matches hour 0 only; the window does not wrap to 23:00 of the previous date.
    let earliest_hour = hour.saturating_sub(1);

    let sample = store.observations.iter().find(|observation| {
        observation.local.date_naive() == date
            && (earliest_hour..=hour).contains(&observation.local.hour())
    });

    match sample {
        Some(observation) if observation.state.is_active() => DayAggregate {
            active_minutes: HOUR_MINUTES,
            inactive_minutes: 0.0,
        },
        Some(_) => DayAggregate {
            active_minutes: 0.0,
            inactive_minutes: HOUR_MINUTES,
        },
        None => DayAggregate::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BusinessHoursRow;
    use crate::uptime::business_hours::FullDayHours;
    use crate::uptime::observation::StoreState;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    const STORE: StoreId = 5;
    const LOOKBACK: u32 = 6;

    fn local(zone: Tz, day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        zone.with_ymd_and_hms(2023, 1, day, hour, minute, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn store(zone: Tz, samples: &[(u32, u32, u32, StoreState)]) -> StoreObservations {
        let mut observations: Vec<Observation> = samples
            .iter()
            .map(|&(day, hour, minute, state)| Observation {
                store_id: STORE,
                local: local(zone, day, hour, minute),
                state,
            })
            .collect();
        observations.sort_by_key(|observation| observation.local);
        StoreObservations {
            timezone: zone,
            observations,
        }
    }

    fn reference(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, day, hour, 0, 0)
            .single()
            .expect("valid reference")
    }

    fn nine_to_five_every_day() -> BusinessHours {
        let rows: Vec<BusinessHoursRow> = (0..7)
            .map(|day| BusinessHoursRow {
                store_id: STORE,
                day,
                start_time_local: "09:00:00".to_string(),
                end_time_local: "17:00:00".to_string(),
            })
            .collect();
        BusinessHours::from_rows(&rows, FullDayHours::default())
    }

    #[test]
    fn observations_on_selects_one_local_date() {
        let store = store(
            chrono_tz::UTC,
            &[
                (22, 23, 59, StoreState::Active),
                (23, 0, 0, StoreState::Active),
                (23, 12, 0, StoreState::Inactive),
                (24, 0, 0, StoreState::Active),
            ],
        );
        let date = NaiveDate::from_ymd_opt(2023, 1, 23).expect("valid date");

        assert_eq!(observations_on(&store, date).len(), 2);
    }

    #[test]
    fn local_date_follows_store_zone() {
        // 2023-01-25 03:00 UTC is still the 24th in Chicago
        let zone = chrono_tz::America::Chicago;
        let store = store(zone, &[(24, 21, 0, StoreState::Active)]);

        let latest = latest_day_with_data(&store, reference(25, 3), LOOKBACK);

        assert_eq!(latest, NaiveDate::from_ymd_opt(2023, 1, 24));
    }

    #[test]
    fn day_window_uses_reference_day_when_present() {
        let hours = nine_to_five_every_day();
        let store = store(
            chrono_tz::UTC,
            &[
                (25, 10, 0, StoreState::Active),
                (25, 13, 0, StoreState::Inactive),
            ],
        );

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals.day.active_minutes, 240.0);
        assert_eq!(totals.day.inactive_minutes, 240.0);
    }

    #[test]
    fn stale_store_falls_back_to_latest_day_with_data() {
        let hours = nine_to_five_every_day();
        let store = store(chrono_tz::UTC, &[(21, 12, 0, StoreState::Inactive)]);

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals.day.inactive_minutes, 480.0);
    }

    #[test]
    fn single_day_of_data_makes_week_equal_day() {
        let hours = nine_to_five_every_day();
        let store = store(
            chrono_tz::UTC,
            &[
                (23, 10, 0, StoreState::Active),
                (23, 15, 0, StoreState::Inactive),
            ],
        );

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals.week, totals.day);
        assert_eq!(totals.day.active_minutes, 360.0);
    }

    #[test]
    fn week_spans_seven_days_ending_on_latest_day() {
        let hours = nine_to_five_every_day();
        let store = store(
            chrono_tz::UTC,
            &[
                (25, 12, 0, StoreState::Active),
                // six days earlier: inside the week
                (19, 12, 0, StoreState::Inactive),
                // seven days earlier: outside the week
                (18, 12, 0, StoreState::Inactive),
            ],
        );

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals.week.active_minutes, 480.0);
        assert_eq!(totals.week.inactive_minutes, 480.0);
    }

    #[test]
    fn each_day_uses_its_own_weekday_hours() {
        let rows = vec![BusinessHoursRow {
            store_id: STORE,
            day: 1,
            start_time_local: "10:00:00".to_string(),
            end_time_local: "12:00:00".to_string(),
        }];
        let hours = BusinessHours::from_rows(&rows, FullDayHours::default());
        // Tuesday 2023-01-24 has configured hours, Monday 2023-01-23 is open all day
        let store = store(
            chrono_tz::UTC,
            &[
                (23, 6, 0, StoreState::Active),
                (24, 11, 0, StoreState::Active),
            ],
        );

        let totals = aggregate(STORE, &store, &hours, reference(24, 19), LOOKBACK);

        assert_eq!(totals.day.active_minutes, 120.0);
        let full_day = 1439.0 + 59.0 / 60.0;
        assert!((totals.week.active_minutes - (120.0 + full_day)).abs() < 1e-9);
    }

    #[test]
    fn overnight_row_closes_its_weekday() {
        let rows = vec![BusinessHoursRow {
            store_id: STORE,
            day: 0,
            start_time_local: "22:00:00".to_string(),
            end_time_local: "02:00:00".to_string(),
        }];
        let hours = BusinessHours::from_rows(&rows, FullDayHours::default());
        // Monday 2023-01-23
        let store = store(chrono_tz::UTC, &[(23, 12, 0, StoreState::Active)]);

        let totals = aggregate(STORE, &store, &hours, reference(23, 19), LOOKBACK);

        assert_eq!(totals.day, DayAggregate::default());
        assert_eq!(totals.week, DayAggregate::default());
    }

    #[test]
    fn silent_store_returns_zero_after_bounded_search() {
        let hours = nine_to_five_every_day();
        // data exists, but eight days before the reference
        let store = store(chrono_tz::UTC, &[(17, 12, 0, StoreState::Active)]);

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals, WindowTotals::default());
        assert_eq!(latest_day_with_data(&store, reference(25, 19), LOOKBACK), None);
    }

    #[test]
    fn search_reaches_exactly_the_lookback_bound() {
        let store = store(chrono_tz::UTC, &[(19, 12, 0, StoreState::Active)]);

        assert_eq!(
            latest_day_with_data(&store, reference(25, 19), LOOKBACK),
            NaiveDate::from_ymd_opt(2023, 1, 19)
        );
        assert_eq!(latest_day_with_data(&store, reference(25, 19), 5), None);
    }

    #[test]
    fn empty_store_yields_zero_totals() {
        let hours = nine_to_five_every_day();
        let store = store(chrono_tz::UTC, &[]);

        let totals = aggregate(STORE, &store, &hours, reference(25, 19), LOOKBACK);

        assert_eq!(totals, WindowTotals::default());
    }

    #[test]
    fn last_hour_uses_first_matching_sample() {
        let store = store(
            chrono_tz::UTC,
            &[
                (25, 17, 59, StoreState::Active),
                (25, 18, 10, StoreState::Inactive),
                (25, 18, 40, StoreState::Active),
            ],
        );

        let hour = last_hour(&store, reference(25, 19));

        assert_eq!(hour.active_minutes, 0.0);
        assert_eq!(hour.inactive_minutes, 60.0);
    }

    #[test]
    fn last_hour_accepts_samples_in_reference_hour() {
        let store = store(chrono_tz::UTC, &[(25, 19, 30, StoreState::Active)]);

        let hour = last_hour(&store, reference(25, 19));

        assert_eq!(hour.active_minutes, 60.0);
    }

    #[test]
    fn last_hour_without_sample_is_zero() {
        let store = store(
            chrono_tz::UTC,
            &[
                (25, 16, 0, StoreState::Active),
                (24, 18, 30, StoreState::Active),
            ],
        );

        let hour = last_hour(&store, reference(25, 19));

        assert_eq!(hour, DayAggregate::default());
    }

    #[test]
    fn last_hour_is_evaluated_in_store_zone() {
        // 19:00 UTC is 14:00 in New York during January
        let zone = chrono_tz::America::New_York;
        let store = store(zone, &[(25, 13, 20, StoreState::Inactive)]);

        let hour = last_hour(&store, reference(25, 19));

        assert_eq!(hour.inactive_minutes, 60.0);
    }

    #[test]
    fn midnight_reference_only_matches_first_hour() {
        let store = store(
            chrono_tz::UTC,
            &[
                (24, 23, 30, StoreState::Inactive),
                (25, 0, 20, StoreState::Active),
            ],
        );

        let hour = last_hour(&store, reference(25, 0));

        assert_eq!(hour.active_minutes, 60.0);
    }
}
