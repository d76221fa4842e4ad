use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use itertools::Itertools;

use crate::{
    core::{optimizer::Diagnostics, solution::SimulationResult},
    quantity::{cost::Cost, energy::WattHours, price::Price},
};

#[expect(clippy::cast_precision_loss)]
pub fn build_plan_table(result: &SimulationResult) -> Table {
    let mean_price = if result.steps.is_empty() {
        Price::ZERO
    } else {
        result.steps.values().map(|step| step.period.price).sum::<Price>()
            / result.steps.len() as f64
    };

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec![
        "Start",
        "End",
        "Price",
        "Production",
        "Consumption",
        "Mode",
        "Other modes",
        "Before",
        "After",
        "Grid",
        "Cost",
    ]);
    for step in result.steps.values() {
        let other_modes = step
            .modes
            .iter()
            .filter(|applied| applied.mode != step.battery_mode.as_str())
            .map(|applied| format!("{}={}", applied.handler, applied.mode))
            .join(", ");
        table.add_row(vec![
            Cell::new(step.period.start.format("%H:%M")),
            Cell::new(step.period.end().format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(step.period.price).fg(if step.period.price >= mean_price {
                Color::Red
            } else {
                Color::Green
            }),
            Cell::new(step.flow.production).set_alignment(CellAlignment::Right),
            Cell::new(step.flow.consumption).set_alignment(CellAlignment::Right),
            Cell::new(step.battery_mode).fg(step.battery_mode.color()),
            Cell::new(other_modes).add_attribute(Attribute::Dim),
            Cell::new(step.energy).set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim),
            Cell::new(step.energy - step.flow.battery).set_alignment(CellAlignment::Right),
            Cell::new(step.flow.grid).set_alignment(CellAlignment::Right).fg(
                if step.flow.grid > WattHours::ZERO { Color::Red } else { Color::Green },
            ),
            Cell::new(step.cost)
                .set_alignment(CellAlignment::Right)
                .fg(if step.cost > Cost::ZERO { Color::Red } else { Color::Green }),
        ]);
    }
    table
}

pub fn build_diagnostics_table(diagnostics: &Diagnostics) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["Generations", "Evaluations", "Cache hits", "Hit rate", "Elapsed", "Violations", "Cost"]);
    table.add_row(vec![
        Cell::new(diagnostics.n_generations),
        Cell::new(diagnostics.n_evaluations),
        Cell::new(diagnostics.n_cache_hits),
        Cell::new(format!("{:.0}%", diagnostics.cache_hit_rate() * 100.0)),
        Cell::new(format!("{:.1?}", diagnostics.elapsed)),
        Cell::new(diagnostics.fitness.map_or(0, |fitness| fitness.violations)).fg(
            if diagnostics.fitness.is_some_and(|fitness| fitness.violations != 0) {
                Color::Red
            } else {
                Color::Green
            },
        ),
        Cell::new(diagnostics.fitness.map_or(Cost::ZERO, |fitness| fitness.cost.round_to_mills())),
    ]);
    table
}
