//! Rayon-parallel batch measurement (feature-gated).
//!
//! Sources are independent, so the batch parallelizes over seeds; each
//! worker builds its own filter table inside the solver.

use crate::batch::StarSeed;
use crate::image::{ImageView, Sample};
use crate::solver::{SigmaSolution, SigmaSolver, SolverConfig};
use crate::trace::trace_span;
use crate::util::FocusResult;
use rayon::prelude::*;

/// Measures every seed in parallel; results keep the seed order.
pub fn measure_batch_par<T: Sample>(
    image: ImageView<'_, T>,
    seeds: &[StarSeed],
    config: &SolverConfig,
) -> FocusResult<Vec<FocusResult<SigmaSolution>>> {
    config.validate()?;
    let _span = trace_span!("measure_batch_par", sources = seeds.len()).entered();
    let solver = SigmaSolver::new(*config);
    Ok(seeds
        .par_iter()
        .map(|seed| solver.solve(image, seed.x, seed.y, seed.sky))
        .collect())
}
