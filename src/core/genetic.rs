mod operators;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use bon::Builder;
use fastrand::Rng;
use rayon::{ThreadPool, prelude::*};

use crate::{
    core::{
        cache::GenotypeCache,
        codec::Genome,
        context::Context,
        fitness::{self, Fitness},
    },
    prelude::*,
};

#[derive(Clone, Debug)]
pub struct Individual {
    pub genome: Genome,
    pub fitness: Fitness,
}

/// Probabilities of the variation operators.
#[derive(Copy, Clone, Debug)]
pub struct Alterers {
    pub crossover: f64,
    pub shift: f64,
    pub shuffle: f64,

    /// Per-gene probability of the Gaussian perturbation.
    pub perturbation: f64,

    pub sigma: f64,
}

impl Default for Alterers {
    fn default() -> Self {
        Self { crossover: 0.6, shift: 0.1, shuffle: 0.1, perturbation: 0.05, sigma: 1.0 }
    }
}

/// Outcome of the evolution.
#[derive(Clone, Debug)]
pub struct Evolution {
    /// Best individual ever seen, including the seeds.
    pub best: Individual,

    pub n_generations: usize,

    /// Evaluations not served by the cache.
    pub n_evaluations: usize,

    pub is_interrupted: bool,
}

/// Genetic search for the cheapest schedule.
#[derive(Builder)]
pub struct Engine<'a> {
    context: &'a Context,
    cache: &'a GenotypeCache,

    /// Stops the evolution at the next generation boundary.
    interrupt: &'a AtomicBool,

    deadline: Instant,

    /// Evaluate on the calling thread when there is no pool.
    pool: Option<&'a ThreadPool>,

    #[builder(default = 10)]
    min_population: usize,

    #[builder(default = 50)]
    max_population: usize,

    max_generations: Option<usize>,
    seed: Option<u64>,

    #[builder(default)]
    alterers: Alterers,
}

impl Engine<'_> {
    #[instrument(skip_all)]
    pub fn run(self, seeds: Vec<Genome>) -> Result<Evolution> {
        ensure!(!seeds.is_empty(), "there must be at least one seed");
        let mut rng = self.seed.map_or_else(Rng::new, Rng::with_seed);
        let population_size = (2 * seeds.len()).clamp(self.min_population, self.max_population);
        let n_elite = (population_size / 4).max(1);
        info!(n_seeds = seeds.len(), population_size, "evolving…");

        let mut n_evaluations = 0;
        let mut genomes = seeds;
        genomes.truncate(population_size);
        let n_seeds = genomes.len();
        while genomes.len() < population_size {
            let mut genome = genomes[rng.usize(..n_seeds)].clone();
            let n_values = self.context.combinations.len();
            operators::perturb(&mut genome, n_values, 0.5, self.alterers.sigma, &mut rng);
            genomes.push(genome);
        }
        let mut population = self.evaluate(genomes, &mut n_evaluations);
        let mut best = population
            .iter()
            .min_by_key(|individual| individual.fitness)
            .cloned()
            .context("the population is empty")?;

        let mut n_generations = 0;
        let is_interrupted = loop {
            if self.interrupt.load(Ordering::Relaxed) {
                break true;
            }
            if Instant::now() >= self.deadline
                || self.max_generations.is_some_and(|max| n_generations >= max)
            {
                break false;
            }

            population.sort_by_key(|individual| individual.fitness);
            let offspring = self.breed(&population, population_size - n_elite, &mut rng);
            let offspring = self.evaluate(offspring, &mut n_evaluations);
            population.truncate(n_elite);
            population.extend(offspring);

            if let Some(candidate) = population.iter().min_by_key(|individual| individual.fitness)
                && candidate.fitness < best.fitness
            {
                trace!(n_generations, fitness = ?candidate.fitness, "improved");
                best = candidate.clone();
            }
            n_generations += 1;
        };

        info!(n_generations, n_evaluations, is_interrupted, fitness = ?best.fitness, "evolved");
        Ok(Evolution { best, n_generations, n_evaluations, is_interrupted })
    }

    /// Produce the children of tournament-selected parents.
    fn breed(&self, population: &[Individual], n_children: usize, rng: &mut Rng) -> Vec<Genome> {
        let n_values = self.context.combinations.len();
        let mut children = Vec::with_capacity(n_children + 1);
        while children.len() < n_children {
            let lhs = &tournament(population, rng).genome;
            let rhs = &tournament(population, rng).genome;
            let (lhs, rhs) = if rng.f64() < self.alterers.crossover {
                operators::crossover(lhs, rhs, rng)
            } else {
                (lhs.to_vec(), rhs.to_vec())
            };
            for mut genes in [lhs, rhs] {
                if rng.f64() < self.alterers.shift {
                    operators::shift_segment(&mut genes, rng);
                }
                if rng.f64() < self.alterers.shuffle {
                    operators::shuffle_segment(&mut genes, rng);
                }
                let Alterers { perturbation, sigma, .. } = self.alterers;
                operators::perturb(&mut genes, n_values, perturbation, sigma, rng);
                children.push(Genome(genes));
            }
        }
        children.truncate(n_children);
        children
    }

    fn evaluate(&self, genomes: Vec<Genome>, n_evaluations: &mut usize) -> Vec<Individual> {
        let evaluate = |genome: Genome| {
            if let Some(fitness) = self.cache.get(&genome) {
                return (Individual { genome, fitness }, false);
            }
            let fitness = fitness::evaluate(self.context, &genome);
            self.cache.add(genome.clone(), fitness);
            (Individual { genome, fitness }, true)
        };
        let evaluated: Vec<_> = match self.pool {
            Some(pool) => pool.install(|| genomes.into_par_iter().map(evaluate).collect()),
            None => genomes.into_iter().map(evaluate).collect(),
        };
        evaluated
            .into_iter()
            .map(|(individual, is_evaluated)| {
                *n_evaluations += usize::from(is_evaluated);
                individual
            })
            .collect()
    }
}

/// Pick the fittest of three random individuals.
fn tournament<'a>(population: &'a [Individual], rng: &mut Rng) -> &'a Individual {
    (0..3)
        .map(|_| &population[rng.usize(..population.len())])
        .min_by_key(|individual| individual.fitness)
        .unwrap_or(&population[0])
}
