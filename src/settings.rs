//! Optimizer and handler settings, loaded from TOML.

use std::{fs, path::Path, time::Duration};

use chrono::TimeDelta;
use enumset::EnumSet;
use serde::Deserialize;

use crate::{
    core::mode::{BatteryMode, ForbiddenCombination},
    prelude::*,
    quantity::power::Watts,
};

#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub optimizer: OptimizerSettings,
    pub ess: EssSettings,
}

impl Settings {
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse `{}`", path.display()))
    }
}

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerSettings {
    /// Hours of quarter-hour resolution before switching to hourly periods.
    pub near_term_hours: i64,

    /// Maximum state of charge when charging from the grid, in percents.
    pub max_state_of_charge: u8,

    /// Price multiplier applied to energy bought for the battery.
    pub efficiency_factor: f64,

    #[serde(rename = "max_grid_charge_power_watts")]
    pub max_grid_charge_power: Watts,

    /// Battery modes the optimizer may choose from.
    pub battery_modes: EnumSet<BatteryMode>,

    /// Handler modes that must never be active together.
    pub forbidden: Vec<ForbiddenCombination>,

    /// Margin before the next quarter when the optimization must be finished.
    pub execution_buffer_secs: i64,

    /// Minimal optimization time, otherwise the deadline moves to the quarter after.
    pub execution_minimum_secs: i64,

    pub min_population: usize,
    pub max_population: usize,

    /// Stop after this many generations even when there is time left.
    pub max_generations: Option<usize>,

    /// Fixed random seed for reproducible runs.
    pub seed: Option<u64>,

    /// Delay between attempts when the inputs are unavailable.
    pub retry_delay_secs: u64,

    /// Attempts before giving up the cycle while no context has been built yet.
    pub cold_start_attempts: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            near_term_hours: 6,
            max_state_of_charge: 90,
            efficiency_factor: 1.17,
            max_grid_charge_power: Watts(4_200),
            battery_modes: EnumSet::all(),
            forbidden: Vec::new(),
            execution_buffer_secs: 30,
            execution_minimum_secs: 60,
            min_population: 10,
            max_population: 50,
            max_generations: None,
            seed: None,
            retry_delay_secs: 30,
            cold_start_attempts: 10,
        }
    }
}

impl OptimizerSettings {
    pub const fn execution_buffer(&self) -> TimeDelta {
        TimeDelta::seconds(self.execution_buffer_secs)
    }

    pub const fn execution_minimum(&self) -> TimeDelta {
        TimeDelta::seconds(self.execution_minimum_secs)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Settings of the battery set-point handler.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EssSettings {
    pub id: String,

    #[serde(rename = "max_apparent_power_watts")]
    pub max_apparent_power: Watts,

    /// State of charge to stop charging from the grid at, in percents.
    pub charge_grid_target: u8,

    /// Maximum set-point change per cycle, relative to the maximum apparent power.
    pub ramp_rate: f64,
}

impl Default for EssSettings {
    fn default() -> Self {
        Self {
            id: "ess0".to_owned(),
            max_apparent_power: Watts(10_000),
            charge_grid_target: 90,
            ramp_rate: 0.05,
        }
    }
}
