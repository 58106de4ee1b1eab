//! Iterative search for the filter sigma that matches a source.
//!
//! For a Gaussian source of width `s` measured with a filter of width
//! `sigma`, `xmom + ymom` is negative when the filter is too wide and
//! positive when it is too narrow. The update
//! `sigma *= sqrt((2 + mom) / (2 - mom))` is exact for a pure Gaussian, so
//! well-behaved sources converge in two or three steps.

use crate::filter::FilterTable;
use crate::image::{ImageView, Sample};
use crate::moments::{Accumulation, GaussianMoments};
use crate::peak::{PeakLocator, DEFAULT_MAX_RETRIES};
use crate::trace::{trace_event, trace_span, trace_step};
use crate::util::{FocusError, FocusResult, LimitStage};

/// Starting sigma when the caller supplies none.
pub const DEFAULT_SIGMA: f64 = 1.2;

/// Configuration for the sigma solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
    /// Starting sigma; `None` or a negative value selects [`DEFAULT_SIGMA`].
    pub initial_sigma: Option<f64>,
    /// Maximum number of sigma updates.
    pub max_iterations: usize,
    /// Convergence threshold on `|xmom + ymom|` and on twice the sigma step.
    pub tolerance: f64,
    /// Bound on peak relocations per iteration.
    pub max_peak_retries: usize,
    /// Overflow policy for moment accumulation.
    pub accumulation: Accumulation,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_sigma: None,
            max_iterations: 10,
            tolerance: 1e-2,
            max_peak_retries: DEFAULT_MAX_RETRIES,
            accumulation: Accumulation::Wide,
        }
    }
}

impl SolverConfig {
    /// Checks that the configuration can drive a solve.
    pub fn validate(&self) -> FocusResult<()> {
        if self.max_iterations == 0 {
            return Err(FocusError::InvalidConfig {
                reason: "max_iterations must be at least 1",
            });
        }
        if self.max_peak_retries == 0 {
            return Err(FocusError::InvalidConfig {
                reason: "max_peak_retries must be at least 1",
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(FocusError::InvalidConfig {
                reason: "tolerance must be positive and finite",
            });
        }
        if self.initial_sigma.is_some_and(f64::is_nan) {
            return Err(FocusError::InvalidConfig {
                reason: "initial_sigma must not be NaN",
            });
        }
        Ok(())
    }

    /// Sigma the first iteration starts from.
    pub fn starting_sigma(&self) -> f64 {
        match self.initial_sigma {
            Some(sigma) if sigma >= 0.0 => sigma,
            _ => DEFAULT_SIGMA,
        }
    }
}

/// Converged filter width and the moments measured with it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmaSolution {
    /// Matched filter sigma.
    pub sigma: f64,
    /// Moments at the sub-pixel peak from the last evaluation.
    pub moments: GaussianMoments,
    /// Number of evaluations performed.
    pub iterations: usize,
    /// Peak relocations in the last evaluation.
    pub peak_retries: usize,
}

/// Drives the filter table and peak locator to a matched sigma.
#[derive(Clone, Debug, Default)]
pub struct SigmaSolver {
    config: SolverConfig,
}

impl SigmaSolver {
    /// Creates a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves for sigma at the source near `(x, y)`.
    pub fn solve<T: Sample>(
        &self,
        image: ImageView<'_, T>,
        x: usize,
        y: usize,
        sky: i64,
    ) -> FocusResult<SigmaSolution> {
        self.config.validate()?;
        let _span = trace_span!("solve_sigma", x = x, y = y).entered();

        let mut table = FilterTable::new();
        let mut sigma = self.config.starting_sigma();
        for iteration in 1..=self.config.max_iterations {
            table.set_sigma(sigma)?;
            let kernel = table
                .kernel()
                .ok_or(FocusError::InvalidSigma { sigma })?;
            let fit = PeakLocator::new(kernel)
                .with_max_retries(self.config.max_peak_retries)
                .with_accumulation(self.config.accumulation)
                .locate(image, x, y, sky)?;
            let moments = fit.moments;
            moments.check_range()?;

            let mom = moments.focus_statistic();
            trace_step!("sigma_iteration", iteration = iteration, sigma = sigma, mom = mom);
            let solution = |sigma| SigmaSolution {
                sigma,
                moments,
                iterations: iteration,
                peak_retries: fit.retries,
            };
            if mom.abs() < self.config.tolerance {
                trace_event!("sigma_converged", sigma = sigma, iterations = iteration);
                return Ok(solution(sigma));
            }

            let previous = sigma;
            sigma *= ((2.0 + mom) / (2.0 - mom)).sqrt();
            if 2.0 * (previous - sigma).abs() < self.config.tolerance {
                trace_event!("sigma_converged", sigma = sigma, iterations = iteration);
                return Ok(solution(sigma));
            }
        }

        Err(FocusError::IterationLimit {
            stage: LimitStage::SigmaSolve,
            limit: self.config.max_iterations,
        })
    }
}

/// Solves for sigma with default settings, starting from `initial_sigma`.
pub fn solve_sigma<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    initial_sigma: Option<f64>,
) -> FocusResult<SigmaSolution> {
    SigmaSolver::new(SolverConfig {
        initial_sigma,
        ..SolverConfig::default()
    })
    .solve(image, x, y, sky)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    fn star(size: usize, sigma: f64) -> OwnedImage<u16> {
        let c = (size / 2) as f64;
        OwnedImage::from_fn(size, size, |x, y| {
            let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
            (40_000.0 * (-r2 / (2.0 * sigma * sigma)).exp()).round() as u16
        })
        .unwrap()
    }

    #[test]
    fn negative_initial_sigma_uses_default() {
        let cfg = SolverConfig {
            initial_sigma: Some(-1.0),
            ..SolverConfig::default()
        };
        assert_eq!(cfg.starting_sigma(), DEFAULT_SIGMA);
        assert_eq!(SolverConfig::default().starting_sigma(), DEFAULT_SIGMA);
    }

    #[test]
    fn zero_initial_sigma_is_rejected_by_the_filter() {
        let img = star(41, 1.5);
        let err = solve_sigma(img.view(), 20, 20, 0, Some(0.0)).unwrap_err();
        assert_eq!(err, FocusError::InvalidSigma { sigma: 0.0 });
        assert_eq!(err.solve_status(), -1);
    }

    #[test]
    fn converges_from_default_guess() {
        let img = star(61, 2.0);
        let sol = solve_sigma(img.view(), 30, 30, 0, None).unwrap();
        assert!((sol.sigma - 2.0).abs() < 0.01, "sigma {}", sol.sigma);
        assert!(sol.iterations <= 10);
    }

    #[test]
    fn single_iteration_budget_hits_limit() {
        let img = star(61, 2.5);
        let solver = SigmaSolver::new(SolverConfig {
            initial_sigma: Some(1.0),
            max_iterations: 1,
            ..SolverConfig::default()
        });
        let err = solver.solve(img.view(), 30, 30, 0).unwrap_err();
        assert_eq!(
            err,
            FocusError::IterationLimit {
                stage: LimitStage::SigmaSolve,
                limit: 1
            }
        );
    }

    #[test]
    fn config_validation_rejects_zero_budgets() {
        let cfg = SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(FocusError::InvalidConfig { .. })
        ));
    }
}
