use std::{num::NonZero, thread};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::prelude::*;

/// Build the evaluation pool, leaving one core to the rest of the controller.
///
/// Returns `None` on single-core hosts, the evaluation then runs on the calling thread.
pub fn build() -> Result<Option<ThreadPool>> {
    let n_threads = thread::available_parallelism().map_or(1, NonZero::get).saturating_sub(1);
    if n_threads == 0 {
        info!("single core, evaluating on the optimizer thread");
        return Ok(None);
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|index| format!("evaluator-{index}"))
        .build()
        .context("failed to build the evaluation pool")?;
    info!(n_threads, "built the evaluation pool");
    Ok(Some(pool))
}
