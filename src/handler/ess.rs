//! Battery set-point controller driven by the schedule.

use chrono::{DateTime, Local};
use enumset::EnumSet;
use parking_lot::Mutex;

use crate::{
    core::{
        mode::{BatteryMode, HandlerModes},
        solution::HandlerSchedule,
    },
    handler::{ScheduleHandler, ramp::RampFilter},
    prelude::*,
    quantity::power::Watts,
    settings::EssSettings,
};

/// Constraint on the battery active power, negative values charge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetPoint {
    /// The inverter balances on its own.
    Free,

    DischargeLimit(Watts),
    Equals(Watts),
}

pub struct EssHandler {
    settings: EssSettings,
    modes: EnumSet<BatteryMode>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    schedule: HandlerSchedule,
    ramp: RampFilter,
}

impl EssHandler {
    pub fn new(settings: EssSettings, modes: EnumSet<BatteryMode>) -> Self {
        Self { settings, modes, state: Mutex::default() }
    }

    /// Battery mode planned for `now`, balancing when nothing is planned.
    pub fn mode_at(&self, now: DateTime<Local>) -> BatteryMode {
        self.state
            .lock()
            .schedule
            .mode_at(now)
            .and_then(|name| name.parse().inspect_err(|error| warn!("{error:#}")).ok())
            .unwrap_or(BatteryMode::Balancing)
    }

    /// Compute the set-point for one device cycle.
    pub fn run(&self, now: DateTime<Local>, state_of_charge: u8) -> SetPoint {
        let mode = self.mode_at(now);
        let max_step = self.settings.max_apparent_power * self.settings.ramp_rate;
        let mut state = self.state.lock();
        let set_point = match mode {
            BatteryMode::Balancing => {
                state.ramp.reset();
                SetPoint::Free
            }
            BatteryMode::DelayDischarge => {
                state.ramp.reset();
                SetPoint::DischargeLimit(Watts::ZERO)
            }
            BatteryMode::ChargeGrid => {
                let target = if state_of_charge < self.settings.charge_grid_target {
                    -self.settings.max_apparent_power
                } else {
                    Watts::ZERO
                };
                SetPoint::Equals(state.ramp.apply(target, max_step))
            }
        };
        debug!(id = %self.settings.id, %mode, state_of_charge, ?set_point, "cycle");
        set_point
    }
}

impl ScheduleHandler for EssHandler {
    fn id(&self) -> &str {
        &self.settings.id
    }

    fn modes(&self) -> HandlerModes {
        HandlerModes::battery(self.modes)
    }

    fn apply(&self, schedule: &HandlerSchedule) {
        info!(id = %self.settings.id, n_entries = schedule.len(), "received the schedule");
        self.state.lock().schedule = schedule.clone();
    }
}
