use crate::core::context::Context;

/// One mode combination index per period.
#[derive(Clone, Debug, Eq, PartialEq, Hash, derive_more::Deref, derive_more::DerefMut, derive_more::From)]
pub struct Genome(pub Vec<usize>);

/// Translate the genome into the combination indices to apply.
///
/// The first period keeps the already applied combination when it is fixed, out-of-range genes
/// fall back to the default combination.
pub fn decode(context: &Context, genome: &Genome) -> Vec<usize> {
    let n_combinations = context.combinations.len();
    genome
        .iter()
        .enumerate()
        .map(|(i, gene)| match context.fixed_first {
            Some(fixed) if i == 0 => fixed,
            _ if *gene < n_combinations => *gene,
            _ => 0,
        })
        .collect()
}

/// Build the genome for a schedule of combination indices.
///
/// Short schedules are padded with the default combination, long ones are cut.
pub fn encode(context: &Context, schedule: &[usize]) -> Option<Genome> {
    let n_combinations = context.combinations.len();
    if schedule.is_empty() || n_combinations == 0 {
        return None;
    }
    let genes = (0..context.periods.len())
        .map(|i| schedule.get(i).copied().filter(|gene| *gene < n_combinations).unwrap_or(0))
        .collect();
    Some(Genome(genes))
}
