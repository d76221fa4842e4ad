use crate::{
    core::{
        codec::{Genome, decode},
        context::Context,
        flow::EnergyFlow,
        simulator::Simulator,
    },
    quantity::{cost::Cost, energy::WattHours, price::Price},
};

/// Quality of a schedule, lower is better.
///
/// Compares the hard-constraint violations first, then the cost.
#[must_use]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, serde::Serialize)]
pub struct Fitness {
    pub violations: usize,
    pub cost: Cost,
}

impl Fitness {
    pub const fn is_feasible(&self) -> bool {
        self.violations == 0
    }
}

/// Simulate the genome over the whole context.
pub fn evaluate(context: &Context, genome: &Genome) -> Fitness {
    let mut simulator = Simulator::new(&context.battery);
    let mut fitness = Fitness::default();
    for (period, index) in context.periods.iter().zip(decode(context, genome)) {
        if !context.combinations.is_feasible(index, period) {
            fitness.violations += 1;
        }
        let combination = context.combinations.get(index);
        let flow = simulator.apply(period, combination.battery, combination.load);
        fitness.cost += period_cost(&flow, period.price, context.efficiency_factor);
    }
    fitness
}

/// Cost of the energy bought in the period.
///
/// Energy bought for the battery is weighted by the efficiency factor. Selling earns nothing.
pub fn period_cost(flow: &EnergyFlow, price: Price, efficiency_factor: f64) -> Cost {
    if flow.grid > WattHours::ZERO {
        flow.grid_to_consumption * price + flow.grid_to_battery * price * efficiency_factor
    } else {
        Cost::ZERO
    }
}
