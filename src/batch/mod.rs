//! Measuring many sources in one frame.
//!
//! Every source gets its own solver state and filter table, so sources can
//! be measured in any order or in parallel against the same read-only image.
//! Failures stay per source: a source near an edge or with a degenerate
//! peak yields an `Err` in its slot and does not affect the others.

use crate::image::{ImageView, Sample};
use crate::solver::{SigmaSolution, SigmaSolver, SolverConfig};
use crate::trace::{trace_event, trace_span};
use crate::util::FocusResult;

#[cfg(feature = "rayon")]
mod rayon;

#[cfg(feature = "rayon")]
pub use self::rayon::measure_batch_par;

/// Integer starting position and sky level of one source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StarSeed {
    /// Column of the brightest raw pixel.
    pub x: usize,
    /// Row of the brightest raw pixel.
    pub y: usize,
    /// Background level subtracted before weighting.
    pub sky: i64,
}

/// Measures every seed serially; results keep the seed order.
pub fn measure_batch<T: Sample>(
    image: ImageView<'_, T>,
    seeds: &[StarSeed],
    config: &SolverConfig,
) -> FocusResult<Vec<FocusResult<SigmaSolution>>> {
    config.validate()?;
    let _span = trace_span!("measure_batch", sources = seeds.len()).entered();
    let solver = SigmaSolver::new(*config);
    let results: Vec<_> = seeds
        .iter()
        .map(|seed| solver.solve(image, seed.x, seed.y, seed.sky))
        .collect();
    trace_event!(
        "batch_measured",
        sources = seeds.len(),
        measured = results.iter().filter(|r| r.is_ok()).count()
    );
    Ok(results)
}

/// Aggregate over the successful measurements of a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchSummary {
    /// Sources with a solution.
    pub measured: usize,
    /// Sources whose measurement failed.
    pub skipped: usize,
    /// Median matched sigma.
    pub median_sigma: f64,
    /// Mean `xmom + ymom` at the matched sigma.
    pub mean_focus_statistic: f64,
}

impl BatchSummary {
    /// Summarizes batch results; `None` when nothing was measured.
    pub fn from_results(results: &[FocusResult<SigmaSolution>]) -> Option<Self> {
        let mut sigmas: Vec<f64> = Vec::with_capacity(results.len());
        let mut stat_sum = 0.0;
        for solution in results.iter().flatten() {
            sigmas.push(solution.sigma);
            stat_sum += solution.moments.focus_statistic();
        }
        if sigmas.is_empty() {
            return None;
        }
        sigmas.sort_by(f64::total_cmp);
        let mid = sigmas.len() / 2;
        let median_sigma = if sigmas.len() % 2 == 0 {
            0.5 * (sigmas[mid - 1] + sigmas[mid])
        } else {
            sigmas[mid]
        };
        Some(Self {
            measured: sigmas.len(),
            skipped: results.len() - sigmas.len(),
            median_sigma,
            mean_focus_statistic: stat_sum / sigmas.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;
    use crate::util::FocusError;

    fn field(stars: &[(f64, f64, f64)]) -> OwnedImage<u16> {
        OwnedImage::from_fn(120, 80, |x, y| {
            let mut v = 200.0;
            for &(cx, cy, s) in stars {
                let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                v += 20_000.0 * (-r2 / (2.0 * s * s)).exp();
            }
            v.round() as u16
        })
        .unwrap()
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let img = field(&[(30.0, 40.0, 1.4), (90.0, 40.0, 2.1)]);
        let seeds = [
            StarSeed { x: 30, y: 40, sky: 200 },
            StarSeed { x: 2, y: 40, sky: 200 },
            StarSeed { x: 90, y: 40, sky: 200 },
        ];
        let results = measure_batch(img.view(), &seeds, &SolverConfig::default()).unwrap();
        assert_eq!(results.len(), 3);
        assert!((results[0].as_ref().unwrap().sigma - 1.4).abs() < 0.02);
        assert!(matches!(results[1], Err(FocusError::EdgeProximity { .. })));
        assert!((results[2].as_ref().unwrap().sigma - 2.1).abs() < 0.02);

        let summary = BatchSummary::from_results(&results).unwrap();
        assert_eq!(summary.measured, 2);
        assert_eq!(summary.skipped, 1);
        assert!((summary.median_sigma - 1.75).abs() < 0.02);
    }

    #[test]
    fn summary_of_failures_is_none() {
        let results = vec![Err(FocusError::DegenerateIntegral { x: 0, y: 0 })];
        assert!(BatchSummary::from_results(&results).is_none());
    }
}
