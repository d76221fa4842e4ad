//! Inputs of the optimizer.

use chrono::{DateTime, Local};

use crate::{
    prelude::*,
    quantity::{energy::WattHours, power::Watts, price::Price},
};

/// Source of the live forecasts and telemetry.
///
/// Implementations are called from the optimizer thread and may block.
pub trait InputProvider: Send + Sync {
    fn snapshot(&self, now: DateTime<Local>) -> Result<InputSnapshot>;
}

/// Battery telemetry, missing values are `None`.
#[must_use]
#[derive(Copy, Clone, Debug, Default)]
pub struct BatteryTelemetry {
    pub capacity: Option<WattHours>,
    pub state_of_charge: Option<u8>,
    pub max_charge_power: Watts,
    pub max_discharge_power: Watts,
}

/// Raw inputs at one point in time.
///
/// Forecasts are per quarter starting with the quarter of `time`. An absent source is `None`,
/// a single missing value inside a forecast is a gap.
#[must_use]
#[derive(Clone, Debug, bon::Builder)]
pub struct InputSnapshot {
    pub time: DateTime<Local>,
    pub productions: Option<Vec<Option<Watts>>>,
    pub consumptions: Option<Vec<Option<Watts>>>,
    pub prices: Option<Vec<Option<Price>>>,
    pub battery: Option<BatteryTelemetry>,

    /// Minimum state of charge requested by the coupled reserve and limit controllers.
    #[builder(default)]
    pub min_states_of_charge: Vec<Option<u8>>,
}
