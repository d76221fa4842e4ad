//! Controllable load that only reports what it has been told to do.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::{
    core::{
        mode::{DiscreteModes, Feasibility, HandlerModes, Mode, ModeEffect},
        period::{Period, Resolution},
        solution::HandlerSchedule,
    },
    handler::ScheduleHandler,
    prelude::*,
    quantity::power::Watts,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSettings {
    pub id: String,

    /// Additional modes next to the default `OFF`, with the power they draw.
    #[serde(default)]
    pub modes: Vec<LoadMode>,

    /// Only allow the additional modes in quarter-hour periods.
    #[serde(default)]
    pub quarter_only: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadMode {
    pub name: String,

    #[serde(rename = "power_watts")]
    pub power: Watts,
}

pub struct LoadHandler {
    settings: LoadSettings,
    schedule: Mutex<HandlerSchedule>,
}

impl LoadHandler {
    pub const OFF: &'static str = "OFF";

    pub fn new(settings: LoadSettings) -> Self {
        Self { settings, schedule: Mutex::default() }
    }

    pub fn mode_at(&self, now: DateTime<Local>) -> String {
        self.schedule.lock().mode_at(now).map_or_else(|| Self::OFF.to_owned(), str::to_owned)
    }
}

impl ScheduleHandler for LoadHandler {
    fn id(&self) -> &str {
        &self.settings.id
    }

    /// A load without additional modes takes part as a fixed handler.
    fn modes(&self) -> HandlerModes {
        if self.settings.modes.is_empty() {
            return HandlerModes::Fixed;
        }
        let modes = std::iter::once(Mode::new(Self::OFF, ModeEffect::Neutral))
            .chain(
                self.settings
                    .modes
                    .iter()
                    .map(|mode| Mode::new(&mode.name, ModeEffect::Load(mode.power))),
            )
            .collect();
        let feasibility = self.settings.quarter_only.then_some(is_quarter_or_off as Feasibility);
        HandlerModes::Discrete(DiscreteModes::builder().modes(modes).maybe_feasibility(feasibility).build())
    }

    fn apply(&self, schedule: &HandlerSchedule) {
        let n_active = schedule.iter().filter(|(_, scheduled)| scheduled.mode != Self::OFF).count();
        info!(id = %self.settings.id, n_entries = schedule.len(), n_active, "received the schedule");
        self.schedule.lock().clone_from(schedule);
    }
}

fn is_quarter_or_off(period: &Period, mode: &Mode) -> bool {
    period.resolution == Resolution::Quarter || mode.effect == ModeEffect::Neutral
}
