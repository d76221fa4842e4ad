use itertools::Itertools;

use crate::core::{
    codec::{Genome, encode},
    context::Context,
    mode::BatteryMode,
};

/// Low and mid price percentiles of the heuristic seeds.
const PERCENTILES: [(f64, f64); 2] = [(5.0, 50.0), (10.0, 75.0)];

/// Build the initial population seeds, the default schedule first.
pub fn build(context: &Context) -> Vec<Genome> {
    let n_periods = context.periods.len();
    std::iter::once(vec![0; n_periods])
        .chain(previous_schedule(context))
        .chain(price_heuristics(context))
        .chain(handler_alternatives(context))
        .filter_map(|schedule| encode(context, &schedule))
        .unique()
        .collect()
}

/// Winner of the previous cycle, re-aligned by time.
fn previous_schedule(context: &Context) -> Option<Vec<usize>> {
    let previous = context.previous.as_ref().filter(|previous| !previous.is_empty())?;
    let schedule = context
        .periods
        .iter()
        .map(|period| {
            previous
                .step_at(period.start)
                .and_then(|step| context.combinations.find_equivalent(&step.modes))
                .unwrap_or(0)
        })
        .collect();
    Some(schedule)
}

/// Charge from the grid in the cheapest periods and hold the energy in the cheaper ones,
/// up to the first price peak.
fn price_heuristics(context: &Context) -> Vec<Vec<usize>> {
    let prices = context.periods.iter().map(|period| period.price.0).collect_vec();
    if prices.is_empty() {
        return Vec::new();
    }
    let peak = find_first_peak(&prices, find_first_valley(&prices, 0));
    let window = &prices[..=peak];
    let charge_grid = context.combinations.find_battery_mode(BatteryMode::ChargeGrid);
    let delay_discharge = context.combinations.find_battery_mode(BatteryMode::DelayDischarge);

    PERCENTILES
        .iter()
        .map(|(low, mid)| {
            let low = percentile(window, *low);
            let mid = percentile(window, *mid);
            prices
                .iter()
                .enumerate()
                .map(|(i, price)| {
                    let mode = if i > peak {
                        None
                    } else if *price <= low {
                        charge_grid
                    } else if *price <= mid {
                        delay_discharge
                    } else {
                        None
                    };
                    mode.unwrap_or(0)
                })
                .collect()
        })
        .collect()
}

/// Above this many pairs, only repeated combinations are seeded for the first two periods.
const MAX_PAIRS: usize = 64;

/// Every combination for the first one or two periods when several handlers have a choice.
fn handler_alternatives(context: &Context) -> Vec<Vec<usize>> {
    if context.combinations.n_choosing_handlers() < 2 {
        return Vec::new();
    }
    let n_combinations = context.combinations.len();
    if n_combinations * n_combinations <= MAX_PAIRS {
        (0..n_combinations)
            .cartesian_product(0..n_combinations)
            .skip(1)
            .map(|(first, second)| vec![first, second])
            .collect()
    } else {
        (1..n_combinations).flat_map(|index| [vec![index], vec![index, index]]).collect()
    }
}

/// Index where the values stop falling.
pub fn find_first_valley(values: &[f64], from: usize) -> usize {
    if from >= values.len() {
        return from;
    }
    values[from..]
        .windows(2)
        .position(|window| window[1] > window[0])
        .map_or(values.len() - 1, |i| from + i)
}

/// Index where the values stop rising.
pub fn find_first_peak(values: &[f64], from: usize) -> usize {
    if from >= values.len() {
        return from;
    }
    values[from..]
        .windows(2)
        .position(|window| window[1] < window[0])
        .map_or(values.len() - 1, |i| from + i)
}

/// Linearly interpolated percentile.
#[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile(values: &[f64], percent: f64) -> f64 {
    let sorted = values.iter().copied().sorted_by(f64::total_cmp).collect_vec();
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };
    let rank = percent / 100.0 * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - rank.floor())
}
