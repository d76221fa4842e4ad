//! Variation operators, all keeping the genome length.

use fastrand::Rng;

/// Random segment of at least two genes.
fn segment(len: usize, rng: &mut Rng) -> (usize, usize) {
    let start = rng.usize(..len - 1);
    let end = rng.usize(start + 2..=len);
    (start, end)
}

/// Delay a random segment by one period, the last gene of the segment moves to its front.
pub fn shift_segment(genes: &mut [usize], rng: &mut Rng) {
    if genes.len() >= 2 {
        let (start, end) = segment(genes.len(), rng);
        genes[start..end].rotate_right(1);
    }
}

pub fn shuffle_segment(genes: &mut [usize], rng: &mut Rng) {
    if genes.len() >= 2 {
        let (start, end) = segment(genes.len(), rng);
        rng.shuffle(&mut genes[start..end]);
    }
}

/// Single-point crossover.
pub fn crossover(lhs: &[usize], rhs: &[usize], rng: &mut Rng) -> (Vec<usize>, Vec<usize>) {
    let len = lhs.len().min(rhs.len());
    if len < 2 {
        return (lhs.to_vec(), rhs.to_vec());
    }
    let point = rng.usize(1..len);
    (
        lhs[..point].iter().chain(&rhs[point..]).copied().collect(),
        rhs[..point].iter().chain(&lhs[point..]).copied().collect(),
    )
}

/// Move each gene with the probability by a normally distributed step.
///
/// Genes stay within `0..n_values`.
#[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn perturb(genes: &mut [usize], n_values: usize, probability: f64, sigma: f64, rng: &mut Rng) {
    let max = n_values.saturating_sub(1) as i64;
    for gene in genes {
        if rng.f64() < probability {
            let step = (standard_normal(rng) * sigma).round() as i64;
            *gene = (*gene as i64 + step).clamp(0, max) as usize;
        }
    }
}

/// [Box–Muller transform](https://en.wikipedia.org/wiki/Box%E2%80%93Muller_transform).
fn standard_normal(rng: &mut Rng) -> f64 {
    let radius = (-2.0 * (1.0 - rng.f64()).ln()).sqrt();
    radius * (std::f64::consts::TAU * rng.f64()).cos()
}
