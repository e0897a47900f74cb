//! Active/inactive minutes for one store-local calendar day.
//!
//! Within each open interval, observations are treated as state changes: a state holds from
//! its observation until the next one. The first observation's state is extended back to the
//! interval's opening and the last one's forward to its close, since nothing is known outside
//! the sampled range. Intervals without any observation contribute nothing.

use crate::uptime::business_hours::OpenInterval;
use crate::uptime::minutes_between;
use crate::uptime::observation::{Observation, StoreState};
use serde::Serialize;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayAggregate {
    pub active_minutes: f64,
    pub inactive_minutes: f64,
}

impl DayAggregate {
    pub fn total_minutes(&self) -> f64 {
        self.active_minutes + self.inactive_minutes
    }

    fn attribute(&mut self, state: StoreState, minutes: f64) {
        match state {
            StoreState::Active => self.active_minutes += minutes,
            StoreState::Inactive => self.inactive_minutes += minutes,
        }
    }
}

impl Add for DayAggregate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            active_minutes: self.active_minutes + rhs.active_minutes,
            inactive_minutes: self.inactive_minutes + rhs.inactive_minutes,
        }
    }
}

impl AddAssign for DayAggregate {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Estimates one day. `observations` must be ascending and belong to the day the
/// `intervals` are anchored to.
pub fn estimate_day(observations: &[Observation], intervals: &[OpenInterval]) -> DayAggregate {
    let mut aggregate = DayAggregate::default();
    if observations.is_empty() {
        return aggregate;
    }

    for interval in intervals {
        let inside: Vec<&Observation> = observations
            .iter()
            .filter(|observation| interval.contains(&observation.local))
            .collect();
        let (Some(first), Some(last)) = (inside.first(), inside.last()) else {
            continue;
        };

        aggregate.attribute(first.state, minutes_between(interval.start, first.local));
        for pair in inside.windows(2) {
            aggregate.attribute(pair[0].state, minutes_between(pair[0].local, pair[1].local));
        }
        aggregate.attribute(last.state, minutes_between(last.local, interval.end));
    }

    aggregate
}
