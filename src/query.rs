//! Recent history combined with the plan, one row per quarter.

use std::collections::VecDeque;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;

use crate::{
    core::{
        deadline::round_down_to_quarter,
        solution::{SimulationResult, Step},
    },
    quantity::{energy::WattHours, power::Watts, price::Price},
};

/// How far back the history reaches.
pub const HISTORY_DEPTH: TimeDelta = TimeDelta::hours(3);

#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub time: DateTime<Local>,
    pub price: Price,
    pub mode: String,
    pub production: Watts,
    pub consumption: Watts,
    pub state_of_charge: Option<i64>,
}

/// Bounded record of what has actually been applied.
#[derive(Debug, Default)]
pub struct History {
    rows: VecDeque<ScheduleRow>,
}

impl History {
    const CAPACITY: usize = 12;

    /// Record the active quarter of the published result.
    pub fn record(&mut self, result: &SimulationResult, now: DateTime<Local>) {
        let quarter = round_down_to_quarter(now);
        let Some(row) = rows(result).find(|row| row.time == quarter) else {
            return;
        };
        if self.rows.back().is_some_and(|last| last.time == quarter) {
            self.rows.pop_back();
        }
        self.rows.push_back(row);
        while self.rows.len() > Self::CAPACITY {
            self.rows.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows from [`HISTORY_DEPTH`] ago till the end of the plan.
pub fn window(history: &History, result: &SimulationResult, now: DateTime<Local>) -> Vec<ScheduleRow> {
    let quarter = round_down_to_quarter(now);
    let since = quarter - HISTORY_DEPTH;
    history
        .rows
        .iter()
        .filter(|row| since <= row.time && row.time < quarter)
        .cloned()
        .chain(rows(result).filter(|row| row.time >= quarter))
        .collect()
}

/// Expand the plan into quarter rows.
fn rows(result: &SimulationResult) -> impl Iterator<Item = ScheduleRow> {
    result.steps.values().flat_map(move |step| expand(result, step))
}

fn expand<'a>(result: &'a SimulationResult, step: &'a Step) -> impl Iterator<Item = ScheduleRow> + 'a {
    let n_quarters = step.period.resolution.n_quarters();
    (0..n_quarters).map(move |i| {
        let energy: WattHours = step.energy - step.flow.battery * i / n_quarters;
        ScheduleRow {
            time: step.period.start + TimeDelta::minutes(15 * i),
            price: step.period.price,
            mode: step.battery_mode.to_string(),
            production: step.flow.production.over_quarters(n_quarters),
            consumption: step.flow.consumption.over_quarters(n_quarters),
            state_of_charge: result.battery.and_then(|battery| battery.state_of_charge(energy)),
        }
    })
}
