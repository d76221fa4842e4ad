//! Static inputs read from a TOML file.

use std::{fs, path::Path, sync::Arc};

use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::{
    handler::{
        ScheduleHandler,
        load::{LoadHandler, LoadSettings},
    },
    prelude::*,
    provider::{BatteryTelemetry, InputProvider, InputSnapshot},
    quantity::{energy::WattHours, power::Watts, price::Price},
};

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Start of the forecasts, defaults to the time of the request.
    pub time: Option<DateTime<Local>>,

    pub battery: BatteryScenario,

    /// Minimum states of charge requested by the coupled controllers, in percents.
    #[serde(default)]
    pub min_states_of_charge: Vec<u8>,

    #[serde(rename = "production_watts")]
    pub productions: Vec<Watts>,

    #[serde(rename = "consumption_watts")]
    pub consumptions: Vec<Watts>,

    pub prices: Vec<Price>,

    /// Controllable loads taking part in the schedule next to the battery.
    #[serde(default)]
    pub loads: Vec<LoadSettings>,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryScenario {
    #[serde(rename = "capacity_watt_hours")]
    pub capacity: Option<WattHours>,

    pub state_of_charge: Option<u8>,

    #[serde(rename = "max_charge_power_watts")]
    pub max_charge_power: Watts,

    #[serde(rename = "max_discharge_power_watts")]
    pub max_discharge_power: Watts,
}

impl Scenario {
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse `{}`", path.display()))
    }

    pub fn load_handlers(&self) -> Vec<Arc<dyn ScheduleHandler>> {
        self.loads
            .iter()
            .map(|settings| Arc::new(LoadHandler::new(settings.clone())) as Arc<dyn ScheduleHandler>)
            .collect()
    }
}

impl InputProvider for Scenario {
    fn snapshot(&self, now: DateTime<Local>) -> Result<InputSnapshot> {
        let battery = BatteryTelemetry {
            capacity: self.battery.capacity,
            state_of_charge: self.battery.state_of_charge,
            max_charge_power: self.battery.max_charge_power,
            max_discharge_power: self.battery.max_discharge_power,
        };
        Ok(InputSnapshot::builder()
            .time(self.time.unwrap_or(now))
            .productions(self.productions.iter().copied().map(Some).collect())
            .consumptions(self.consumptions.iter().copied().map(Some).collect())
            .prices(self.prices.iter().copied().map(Some).collect())
            .battery(battery)
            .min_states_of_charge(self.min_states_of_charge.iter().copied().map(Some).collect())
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::period::fixtures::noon;

    const SCENARIO: &str = r#"
        production_watts = [0, 0, 1000, 2000]
        consumption_watts = [500, 500, 500, 500]
        prices = [120.0, 80.0, 40.0, 150.0]
        min_states_of_charge = [10, 20]

        [battery]
        capacity_watt_hours = 10000
        state_of_charge = 50
        max_charge_power_watts = 5000
        max_discharge_power_watts = 5000

        [[loads]]
        id = "heat0"
        quarter_only = true
        modes = [{ name = "BOOST", power_watts = 2000 }]
    "#;

    #[test]
    fn snapshot() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let snapshot = scenario.snapshot(noon()).unwrap();
        assert_eq!(snapshot.time, noon());
        assert_eq!(snapshot.productions.unwrap()[3], Some(Watts(2_000)));
        assert_eq!(snapshot.prices.unwrap()[2], Some(Price(40.0)));
        assert_eq!(snapshot.battery.unwrap().capacity, Some(WattHours(10_000)));
        assert_eq!(snapshot.min_states_of_charge, [Some(10), Some(20)]);
    }

    #[test]
    fn load_handlers() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let handlers = scenario.load_handlers();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].id(), "heat0");
    }

    #[test]
    fn missing_state_of_charge() {
        let scenario: Scenario = toml::from_str(&SCENARIO.replace("state_of_charge = 50", "")).unwrap();
        let snapshot = scenario.snapshot(noon()).unwrap();
        assert_eq!(snapshot.battery.unwrap().state_of_charge, None);
    }
}
