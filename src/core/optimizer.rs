use std::{
    sync::atomic::AtomicBool,
    time::{Duration, Instant},
};

use bon::Builder;
use chrono::{DateTime, Local};
use rayon::ThreadPool;

use crate::{
    core::{
        cache::GenotypeCache,
        codec::Genome,
        context::Context,
        deadline::execution_limit,
        fitness::Fitness,
        genetic::Engine,
        population,
        solution::SimulationResult,
    },
    prelude::*,
    settings::OptimizerSettings,
};

/// Counters of one optimization pass.
#[must_use]
#[derive(Copy, Clone, Debug, Default, serde::Serialize)]
pub struct Diagnostics {
    pub n_evaluations: usize,
    pub n_cache_hits: usize,
    pub n_generations: usize,
    pub elapsed: Duration,
    pub fitness: Option<Fitness>,
}

impl Diagnostics {
    #[expect(clippy::cast_precision_loss)]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.n_evaluations + self.n_cache_hits;
        if total == 0 { 0.0 } else { self.n_cache_hits as f64 / total as f64 }
    }
}

#[must_use]
#[derive(Debug)]
pub enum Outcome {
    Optimized(SimulationResult),

    /// Nothing to optimize, the default schedule is simulated instead.
    Skipped(SimulationResult),

    /// The pass was interrupted, nothing must be published.
    Interrupted,
}

/// One optimization pass over a context.
#[derive(Builder)]
pub struct Optimizer<'a> {
    context: &'a Context,
    settings: &'a OptimizerSettings,
    pool: Option<&'a ThreadPool>,
    interrupt: &'a AtomicBool,
    now: DateTime<Local>,
}

impl Optimizer<'_> {
    #[instrument(skip_all)]
    pub fn run(self) -> Result<(Outcome, Diagnostics)> {
        let start_instant = Instant::now();
        let n_periods = self.context.periods.len();

        if !self.context.is_worth_optimizing() {
            info!(n_periods, "nothing to optimize, simulating the default schedule");
            let result = SimulationResult::simulate(self.context, &Genome(vec![0; n_periods]));
            let diagnostics = Diagnostics {
                elapsed: start_instant.elapsed(),
                fitness: result.fitness,
                ..Diagnostics::default()
            };
            return Ok((Outcome::Skipped(result), diagnostics));
        }

        let limit = execution_limit(
            self.now,
            self.settings.execution_buffer(),
            self.settings.execution_minimum(),
        );
        let deadline = start_instant + limit.to_std().context("negative execution limit")?;
        info!(n_periods, ?limit, "optimizing…");

        let cache = GenotypeCache::default();
        let evolution = Engine::builder()
            .context(self.context)
            .cache(&cache)
            .interrupt(self.interrupt)
            .deadline(deadline)
            .maybe_pool(self.pool)
            .min_population(self.settings.min_population)
            .max_population(self.settings.max_population)
            .maybe_max_generations(self.settings.max_generations)
            .maybe_seed(self.settings.seed)
            .build()
            .run(population::build(self.context))?;

        let diagnostics = Diagnostics {
            n_evaluations: evolution.n_evaluations,
            n_cache_hits: cache.n_hits(),
            n_generations: evolution.n_generations,
            elapsed: start_instant.elapsed(),
            fitness: Some(evolution.best.fitness),
        };
        info!(
            n_evaluations = diagnostics.n_evaluations,
            n_cache_hits = diagnostics.n_cache_hits,
            cache_hit_rate = diagnostics.cache_hit_rate(),
            elapsed = ?diagnostics.elapsed,
            "optimized",
        );

        if evolution.is_interrupted {
            warn!("interrupted, discarding the result");
            return Ok((Outcome::Interrupted, diagnostics));
        }
        let result = SimulationResult::simulate(self.context, &evolution.best.genome);
        Ok((Outcome::Optimized(result), diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::{
        context::fixtures::{context, snapshot},
        period::fixtures::noon,
    };

    fn settings() -> OptimizerSettings {
        OptimizerSettings { max_generations: Some(20), seed: Some(42), ..OptimizerSettings::default() }
    }

    #[test]
    fn optimized() {
        let prices = [10.0, 10.0, 90.0, 90.0, 90.0, 90.0];
        let context = context(&snapshot(noon(), &[0; 6], &[3_000; 6], &prices));
        let interrupt = AtomicBool::new(false);
        let (outcome, diagnostics) = Optimizer::builder()
            .context(&context)
            .settings(&settings())
            .interrupt(&interrupt)
            .now(noon())
            .build()
            .run()
            .unwrap();
        let Outcome::Optimized(result) = outcome else { panic!("{outcome:?}") };
        assert_eq!(result.steps.len(), 6);
        assert_eq!(result.fitness, diagnostics.fitness);
        assert_eq!(diagnostics.n_generations, 20);
        assert!(diagnostics.n_evaluations > 0);
    }

    #[test]
    fn skipped_on_flat_prices() {
        let context = context(&snapshot(noon(), &[0; 6], &[3_000; 6], &[50.0; 6]));
        let interrupt = AtomicBool::new(false);
        let (outcome, diagnostics) = Optimizer::builder()
            .context(&context)
            .settings(&settings())
            .interrupt(&interrupt)
            .now(noon())
            .build()
            .run()
            .unwrap();
        let Outcome::Skipped(result) = outcome else { panic!("{outcome:?}") };
        assert!(result.steps.values().all(|step| step.modes[0].mode == "BALANCING"));
        assert_eq!(diagnostics.n_evaluations, 0);
    }

    #[test]
    fn interrupted() {
        let prices = [10.0, 10.0, 90.0, 90.0];
        let context = context(&snapshot(noon(), &[0; 4], &[3_000; 4], &prices));
        let interrupt = AtomicBool::new(true);
        let (outcome, _) = Optimizer::builder()
            .context(&context)
            .settings(&settings())
            .interrupt(&interrupt)
            .now(noon())
            .build()
            .run()
            .unwrap();
        assert!(matches!(outcome, Outcome::Interrupted));
    }

    #[test]
    fn cache_hit_rate() {
        let diagnostics = Diagnostics { n_evaluations: 30, n_cache_hits: 10, ..Diagnostics::default() };
        assert_abs_diff_eq!(diagnostics.cache_hit_rate(), 0.25);
        assert_abs_diff_eq!(Diagnostics::default().cache_hit_rate(), 0.0);
    }
}
