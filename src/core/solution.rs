use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::{
    core::{
        battery::BatteryParameters,
        codec::{Genome, decode},
        context::Context,
        deadline::round_down_to_quarter,
        fitness::{Fitness, period_cost},
        flow::EnergyFlow,
        mode::{AppliedMode, BatteryMode, ModeCombinations},
        period::Period,
        simulator::Simulator,
    },
    quantity::{cost::Cost, energy::WattHours},
};

/// Planned period of the published schedule.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub period: Period,

    /// Battery energy at the start of the period.
    pub energy: WattHours,

    pub flow: EnergyFlow,
    pub cost: Cost,

    /// Index of the chosen mode combination in the context it was optimized for.
    pub combination: usize,

    /// Simplest battery mode with the same effect as the chosen one.
    pub battery_mode: BatteryMode,

    pub modes: Vec<AppliedMode>,
}

/// Outcome of an optimization run, replaced as a whole on every publish.
#[must_use]
#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    pub steps: BTreeMap<DateTime<Local>, Step>,
    pub battery: Option<BatteryParameters>,
    pub fitness: Option<Fitness>,

    /// Modes to apply when no step covers the time.
    pub defaults: Vec<AppliedMode>,
}

impl SimulationResult {
    /// Schedule without any instruction, handlers fall back to their own defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Schedule that keeps every handler in its default mode.
    pub fn with_defaults(combinations: &ModeCombinations) -> Self {
        Self { defaults: combinations.applied_modes(0), ..Self::default() }
    }

    /// Re-simulate the genome and record every period.
    pub fn simulate(context: &Context, genome: &Genome) -> Self {
        let mut simulator = Simulator::new(&context.battery);
        let mut fitness = Fitness::default();
        let mut steps = BTreeMap::new();

        for (period, index) in context.periods.iter().zip(decode(context, genome)) {
            if !context.combinations.is_feasible(index, period) {
                fitness.violations += 1;
            }
            let combination = context.combinations.get(index);
            let battery_mode = simulator.simplify(period, combination.battery, combination.load);
            let energy = simulator.energy;
            let flow = simulator.apply(period, combination.battery, combination.load);
            let cost = period_cost(&flow, period.price, context.efficiency_factor);
            fitness.cost += cost;
            steps.insert(
                period.start,
                Step {
                    period: period.clone(),
                    energy,
                    flow,
                    cost,
                    combination: index,
                    battery_mode,
                    modes: context.combinations.applied_modes_with_battery(index, battery_mode),
                },
            );
        }

        Self {
            steps,
            battery: Some(context.battery),
            fitness: Some(fitness),
            defaults: context.combinations.applied_modes(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Find the step covering the quarter of `time`.
    pub fn step_at(&self, time: DateTime<Local>) -> Option<&Step> {
        let quarter = round_down_to_quarter(time);
        self.steps
            .range(..=quarter)
            .next_back()
            .map(|(_, step)| step)
            .filter(|step| step.period.contains(quarter))
    }

    /// Modes to apply at `time`.
    pub fn modes_at(&self, time: DateTime<Local>) -> Option<&[AppliedMode]> {
        self.step_at(time)
            .map(|step| step.modes.as_slice())
            .or_else(|| (!self.defaults.is_empty()).then_some(self.defaults.as_slice()))
    }

    /// Keep the step of the currently active quarter from the previous result.
    pub fn keep_active_step(&mut self, previous: &Self, now: DateTime<Local>) {
        let quarter = round_down_to_quarter(now);
        if let Some(step) = previous.step_at(quarter)
            && step.period.start == quarter
            && let Some(current) = self.steps.get_mut(&quarter)
        {
            current.clone_from(step);
        }
    }

    /// Modes planned for one handler.
    pub fn schedule_of(&self, handler: &str) -> HandlerSchedule {
        let entries = self
            .steps
            .values()
            .filter_map(|step| {
                let applied = step.modes.iter().find(|applied| applied.handler == handler)?;
                Some((
                    step.period.start,
                    ScheduledMode { end: step.period.end(), mode: applied.mode.clone() },
                ))
            })
            .collect();
        HandlerSchedule { entries }
    }

    pub fn total_cost(&self) -> Cost {
        self.steps.values().map(|step| step.cost).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledMode {
    pub end: DateTime<Local>,
    pub mode: String,
}

/// Mode per period for one handler.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerSchedule {
    entries: BTreeMap<DateTime<Local>, ScheduledMode>,
}

impl HandlerSchedule {
    pub fn mode_at(&self, time: DateTime<Local>) -> Option<&str> {
        self.entries
            .range(..=time)
            .next_back()
            .filter(|(_, scheduled)| time < scheduled.end)
            .map(|(_, scheduled)| scheduled.mode.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Local>, &ScheduledMode)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::core::{
        context::fixtures::{context, snapshot},
        period::{Resolution, fixtures::noon},
    };

    #[test]
    fn energy_carries_over() {
        let context = context(&snapshot(noon(), &[0; 4], &[4000; 4], &[100.0; 4]));
        let result = SimulationResult::simulate(&context, &Genome(vec![0; 4]));
        let energies: Vec<_> = result.steps.values().map(|step| step.energy.0).collect();
        assert_eq!(energies, [5000, 4000, 3000, 2000]);
        for (step, next) in result.steps.values().zip(result.steps.values().skip(1)) {
            assert_eq!(next.energy, step.energy - step.flow.battery);
        }
        assert_eq!(result.fitness.unwrap().cost, Cost::ZERO);
    }

    #[test]
    fn published_modes_are_simplified() {
        // Full enough to never charge from the grid:
        let mut snapshot = snapshot(noon(), &[2000; 2], &[400; 2], &[100.0, 200.0]);
        snapshot.battery.as_mut().unwrap().state_of_charge = Some(95);
        let context = context(&snapshot);
        let result = SimulationResult::simulate(&context, &Genome(vec![2, 1]));
        let modes: Vec<_> = result.steps.values().map(|step| step.modes[0].mode.as_str()).collect();
        assert_eq!(modes, ["BALANCING", "BALANCING"]);
        assert_eq!(result.steps.values().next().unwrap().combination, 2);
    }

    #[test]
    fn lookup_by_quarter() {
        let mut context = context(&snapshot(noon(), &[0; 8], &[400; 8], &[100.0; 8]));
        context.periods = vec![
            context.periods[0].clone(),
            Period::hour(&[
                context.periods[1].clone(),
                context.periods[2].clone(),
                context.periods[3].clone(),
                context.periods[4].clone(),
            ]),
        ];
        let result = SimulationResult::simulate(&context, &Genome(vec![0, 1]));
        assert_eq!(result.step_at(noon() + TimeDelta::minutes(14)).unwrap().period.start, noon());
        let hour = result.step_at(noon() + TimeDelta::minutes(50)).unwrap();
        assert_eq!(hour.period.resolution, Resolution::Hour);
        assert_eq!(hour.modes[0].mode, "DELAY_DISCHARGE");
        assert!(result.step_at(noon() + TimeDelta::minutes(75)).is_none());
        assert_eq!(result.modes_at(noon() + TimeDelta::minutes(75)).unwrap()[0].mode, "BALANCING");
        assert!(SimulationResult::empty().modes_at(noon()).is_none());
    }

    #[test]
    fn handler_schedule() {
        let context = context(&snapshot(noon(), &[0; 3], &[4000; 3], &[100.0; 3]));
        let result = SimulationResult::simulate(&context, &Genome(vec![0, 1, 0]));
        let schedule = result.schedule_of("ess0");
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.mode_at(noon() + TimeDelta::minutes(20)), Some("DELAY_DISCHARGE"));
        assert_eq!(schedule.mode_at(noon() + TimeDelta::minutes(45)), None);
        assert!(result.schedule_of("unknown").is_empty());
    }

    #[test]
    fn active_step_is_kept() {
        let context = context(&snapshot(noon(), &[0; 3], &[4000; 3], &[100.0; 3]));
        let previous = SimulationResult::simulate(&context, &Genome(vec![1, 1, 1]));
        let mut result = SimulationResult::simulate(&context, &Genome(vec![0, 0, 0]));
        result.keep_active_step(&previous, noon() + TimeDelta::minutes(7));
        let modes: Vec<_> = result.steps.values().map(|step| step.modes[0].mode.as_str()).collect();
        assert_eq!(modes, ["DELAY_DISCHARGE", "BALANCING", "BALANCING"]);
    }

    #[test]
    fn defaults_only() {
        let context = context(&snapshot(noon(), &[0; 3], &[4000; 3], &[100.0; 3]));
        let result = SimulationResult::with_defaults(&context.combinations);
        assert!(result.is_empty());
        assert_eq!(result.modes_at(noon()).unwrap()[0].mode, "BALANCING");
    }
}
