use crate::{
    core::{battery::BatteryParameters, flow::EnergyFlow, mode::BatteryMode, period::Period},
    quantity::{energy::WattHours, power::Watts},
};

/// Simulates the battery period by period, carrying the energy over.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Simulator<'a> {
    pub battery: &'a BatteryParameters,

    /// Energy at the start of the next period.
    pub energy: WattHours,
}

impl<'a> Simulator<'a> {
    pub const fn new(battery: &'a BatteryParameters) -> Self {
        Self { battery, energy: battery.initial_energy }
    }

    /// Simulate the period and move the energy to its end.
    pub fn apply(&mut self, period: &Period, mode: BatteryMode, load: Watts) -> EnergyFlow {
        let flow = self.peek(period, mode, load);
        self.energy -= flow.battery;
        flow
    }

    /// Simulate the period without changing the state.
    pub fn peek(&self, period: &Period, mode: BatteryMode, load: Watts) -> EnergyFlow {
        let production = period.production;
        let consumption = period.consumption + load.per_quarter() * period.resolution.n_quarters();
        let balancing = consumption - production;

        let (target, max_energy) = match mode {
            BatteryMode::Balancing => (balancing, self.battery.total_energy),
            BatteryMode::DelayDischarge => (balancing.min(WattHours::ZERO), self.battery.total_energy),
            BatteryMode::ChargeGrid => (
                balancing.min(WattHours::ZERO) - period.max_grid_buy,
                self.battery.max_soc_energy,
            ),
        };

        // The state of charge limits first, then the power limits:
        let max_charge = (max_energy - self.energy).max(WattHours::ZERO);
        let max_discharge = (self.energy - self.battery.min_soc_energy).max(WattHours::ZERO);
        let battery = target
            .clamp(-max_charge, max_discharge)
            .clamp(-period.max_charge, period.max_discharge);

        EnergyFlow::new(production, consumption, battery)
    }

    /// Find the simplest mode that charges at least as much as the given one.
    pub fn simplify(&self, period: &Period, mode: BatteryMode, load: Watts) -> BatteryMode {
        let simpler = match mode {
            BatteryMode::ChargeGrid => BatteryMode::DelayDischarge,
            BatteryMode::DelayDischarge => BatteryMode::Balancing,
            BatteryMode::Balancing => return mode,
        };
        if self.peek(period, mode, load).battery >= self.peek(period, simpler, load).battery {
            self.simplify(period, simpler, load)
        } else {
            mode
        }
    }
}
