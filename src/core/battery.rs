use crate::quantity::energy::WattHours;

/// Energy limits of the storage for one optimization run.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BatteryParameters {
    /// Usable capacity.
    pub total_energy: WattHours,

    pub min_soc_energy: WattHours,

    /// Upper bound when charging from the grid.
    pub max_soc_energy: WattHours,

    /// Energy at the start of the first period.
    pub initial_energy: WattHours,
}

impl BatteryParameters {
    /// Convert the percentages into energies.
    ///
    /// The integer percent arithmetic truncates the same way the device reports it.
    pub fn from_percentages(
        capacity: WattHours,
        state_of_charge: u8,
        min_state_of_charge: u8,
        max_state_of_charge: u8,
    ) -> Self {
        let per_percent = capacity / 100;
        #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let max_soc_energy =
            WattHours((f64::from(max_state_of_charge) / 100.0 * capacity.0 as f64).round() as i64);
        Self {
            total_energy: capacity,
            min_soc_energy: per_percent * i64::from(min_state_of_charge),
            max_soc_energy,
            initial_energy: per_percent * i64::from(state_of_charge),
        }
    }

    /// Current state of charge in percents.
    pub fn state_of_charge(&self, energy: WattHours) -> Option<i64> {
        energy.percent_of(self.total_energy)
    }
}
