use std::sync::Arc;

use bon::bon;
use chrono::{DateTime, Local, TimeDelta, Timelike};
use itertools::Itertools;

use crate::{
    core::{
        battery::BatteryParameters,
        deadline::round_down_to_quarter,
        error::InputUnavailable,
        forecast::forward_fill,
        mode::ModeCombinations,
        period::{Period, Resolution},
        solution::SimulationResult,
    },
    prelude::*,
    provider::InputSnapshot,
    quantity::{energy::WattHours, power::Watts},
    settings::OptimizerSettings,
};

/// Immutable inputs of one optimization run.
#[must_use]
#[derive(Clone, Debug)]
pub struct Context {
    /// Start of the first period.
    pub time: DateTime<Local>,

    pub periods: Vec<Period>,
    pub battery: BatteryParameters,
    pub combinations: Arc<ModeCombinations>,
    pub efficiency_factor: f64,

    /// Combination that is already active in the first period.
    pub fixed_first: Option<usize>,

    /// Result of the previous cycle, used to seed the population.
    pub previous: Option<Arc<SimulationResult>>,
}

#[bon]
impl Context {
    #[builder]
    pub fn new(
        snapshot: &InputSnapshot,
        settings: &OptimizerSettings,
        combinations: Arc<ModeCombinations>,
        previous: Option<Arc<SimulationResult>>,
    ) -> Result<Self> {
        let time = round_down_to_quarter(snapshot.time);

        let telemetry = snapshot.battery.ok_or(InputUnavailable::Battery)?;
        let capacity = telemetry.capacity.ok_or(InputUnavailable::Capacity)?;
        let state_of_charge = telemetry.state_of_charge.ok_or(InputUnavailable::StateOfCharge)?;
        let min_state_of_charge =
            snapshot.min_states_of_charge.iter().flatten().copied().max().unwrap_or(0).min(100);
        let battery = BatteryParameters::from_percentages(
            capacity,
            state_of_charge,
            min_state_of_charge,
            settings.max_state_of_charge,
        );

        let consumptions =
            forward_fill(snapshot.consumptions.as_deref().ok_or(InputUnavailable::Consumption)?);
        let mut productions =
            forward_fill(snapshot.productions.as_deref().ok_or(InputUnavailable::Production)?);
        if productions.len() < consumptions.len() {
            productions.resize(consumptions.len(), Watts::ZERO);
        }
        let prices = forward_fill(snapshot.prices.as_deref().ok_or(InputUnavailable::Prices)?);

        // Some inverters report the allowed charge power as a negative number.
        let max_charge = telemetry.max_charge_power.abs().per_quarter();
        let max_discharge = telemetry.max_discharge_power.abs().per_quarter();
        let max_grid_buy = settings.max_grid_charge_power.per_quarter();
        let quarters = productions
            .iter()
            .zip(&consumptions)
            .zip(&prices)
            .enumerate()
            .map(|(i, ((production, consumption), price))| Period {
                start: time + TimeDelta::minutes(15) * i32::try_from(i).unwrap_or(i32::MAX),
                resolution: Resolution::Quarter,
                production: production.per_quarter(),
                consumption: consumption.per_quarter(),
                price: *price,
                max_charge,
                max_discharge,
                max_grid_buy,
            })
            .collect_vec();

        let periods = graduate(quarters, n_near_term_quarters(time, settings.near_term_hours));
        let fixed_first = previous
            .as_ref()
            .zip(periods.first())
            .and_then(|(previous, first)| previous.step_at(first.start))
            .and_then(|step| combinations.find_equivalent(&step.modes));

        info!(
            n_periods = periods.len(),
            initial_energy = ?battery.initial_energy,
            min_soc_energy = ?battery.min_soc_energy,
            is_first_period_fixed = fixed_first.is_some(),
            "built the context",
        );
        Ok(Self {
            time,
            periods,
            battery,
            combinations,
            efficiency_factor: settings.efficiency_factor,
            fixed_first,
            previous,
        })
    }
}

impl Context {
    pub const fn is_first_period_fixed(&self) -> bool {
        self.fixed_first.is_some()
    }

    /// Check whether any schedule could beat the default one.
    pub fn is_worth_optimizing(&self) -> bool {
        let Some(first) = self.periods.first() else {
            return false;
        };
        let has_energy = self
            .periods
            .iter()
            .any(|period| period.production != WattHours::ZERO || period.consumption != WattHours::ZERO);
        let has_price_spread = self.periods.iter().any(|period| period.price != first.price);
        has_energy && has_price_spread
    }
}

/// Quarter-hour periods for the near-term window, counted up to the next full hour.
fn n_near_term_quarters(time: DateTime<Local>, near_term_hours: i64) -> usize {
    let to_full_hour = (4 - i64::from(time.minute()) / 15) % 4;
    usize::try_from(near_term_hours * 4 + to_full_hour).unwrap_or(0)
}

/// Keep the near-term quarters, merge the rest into hours and drop an incomplete trailing hour.
fn graduate(quarters: Vec<Period>, n_near_term: usize) -> Vec<Period> {
    let n_near_term = n_near_term.min(quarters.len());
    let (hours, _) = quarters[n_near_term..].as_chunks::<4>();
    let hours = hours.iter().map(Period::hour).collect_vec();
    let mut periods = quarters;
    periods.truncate(n_near_term);
    periods.extend(hours);
    periods
}
