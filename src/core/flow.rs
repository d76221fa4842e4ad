use crate::quantity::energy::WattHours;

/// Energy flows of one period.
///
/// Battery is positive when discharging, grid is positive when buying. Sub-flows are never
/// negative for the flows the battery modes can produce.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct EnergyFlow {
    pub production: WattHours,
    pub consumption: WattHours,
    pub battery: WattHours,
    pub grid: WattHours,
    pub production_to_consumption: WattHours,
    pub production_to_grid: WattHours,
    pub production_to_battery: WattHours,
    pub grid_to_consumption: WattHours,
    pub battery_to_consumption: WattHours,
    pub grid_to_battery: WattHours,
}

impl EnergyFlow {
    /// Decompose the flows given the battery flow.
    pub fn new(production: WattHours, consumption: WattHours, battery: WattHours) -> Self {
        let grid = consumption - production - battery;
        let production_to_consumption = production.min(consumption);
        let production_to_battery =
            (-battery).min(production - production_to_consumption).max(WattHours::ZERO);
        let production_to_grid =
            (production - production_to_consumption - production_to_battery).max(WattHours::ZERO);
        let battery_to_consumption = (consumption - production_to_consumption)
            .min(battery - production_to_grid)
            .max(WattHours::ZERO);
        let grid_to_consumption =
            (consumption - battery_to_consumption - production_to_consumption).max(WattHours::ZERO);
        let grid_to_battery = grid - grid_to_consumption + production_to_grid;
        Self {
            production,
            consumption,
            battery,
            grid,
            production_to_consumption,
            production_to_grid,
            production_to_battery,
            grid_to_consumption,
            battery_to_consumption,
            grid_to_battery,
        }
    }
}
