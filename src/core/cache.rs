use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::RwLock;

use crate::core::{codec::Genome, fitness::Fitness};

/// Fitness memo of the genomes evaluated during one run.
#[derive(Debug, Default)]
pub struct GenotypeCache {
    fitnesses: RwLock<HashMap<Genome, Fitness>>,
    n_hits: AtomicUsize,
}

impl GenotypeCache {
    pub fn get(&self, genome: &Genome) -> Option<Fitness> {
        let fitness = self.fitnesses.read().get(genome).copied();
        if fitness.is_some() {
            self.n_hits.fetch_add(1, Ordering::Relaxed);
        }
        fitness
    }

    pub fn add(&self, genome: Genome, fitness: Fitness) {
        self.fitnesses.write().insert(genome, fitness);
    }

    pub fn n_hits(&self) -> usize {
        self.n_hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.fitnesses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
