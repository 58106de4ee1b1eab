//! Sub-pixel peak localization over a 3x3 grid of moment evaluations.
//!
//! The smoothed image (`filval`) is evaluated at the integer guess and its
//! eight neighbors. If a neighbor is brighter the guess moves one pixel
//! toward it and the search restarts, up to a bounded number of moves. At a
//! confirmed discrete maximum, independent parabolas along the rows, columns
//! and both diagonals give the sub-pixel offset, the peak `filval`, and each
//! moment interpolated to that offset.

use crate::filter::Kernel;
use crate::image::{ImageView, Sample};
use crate::moments::{Accumulation, GaussianMoments, MomentEvaluator, PIXEL_CENTER_OFFSET};
use crate::refine::quad2d::{fit_direction, interpolate_pair};
use crate::trace::{trace_span, trace_step};
use crate::util::{FocusError, FocusResult, LimitStage, PeakDirection};

/// Default bound on center relocations.
pub const DEFAULT_MAX_RETRIES: usize = 15;

/// Curvature below which a direction is too flat to localize.
pub const FLAT_PEAK_EPS: f64 = 1e-10;

/// Outcome of a successful peak search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakFit {
    /// Moments interpolated to the sub-pixel peak, with `xf`/`yf` set.
    pub moments: GaussianMoments,
    /// Number of relocations needed to reach the discrete maximum.
    pub retries: usize,
    /// Integer column of the discrete maximum.
    pub x: usize,
    /// Integer row of the discrete maximum.
    pub y: usize,
}

/// Locates the smoothed-image peak near an integer guess.
#[derive(Clone, Copy, Debug)]
pub struct PeakLocator<'k> {
    evaluator: MomentEvaluator<'k>,
    max_retries: usize,
}

impl<'k> PeakLocator<'k> {
    /// Creates a locator with the default retry bound.
    pub fn new(kernel: &'k Kernel) -> Self {
        Self {
            evaluator: MomentEvaluator::new(kernel),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the bound on center relocations.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Selects the overflow policy of the underlying evaluator.
    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.evaluator = self.evaluator.with_accumulation(accumulation);
        self
    }

    /// Runs the search from `(x, y)`.
    pub fn locate<T: Sample>(
        &self,
        image: ImageView<'_, T>,
        mut x: usize,
        mut y: usize,
        sky: i64,
    ) -> FocusResult<PeakFit> {
        let _span = trace_span!("locate_peak", x = x, y = y).entered();
        let ncut = self.evaluator.kernel().ncut();
        let mut retries = 0usize;

        let grid = loop {
            if retries >= self.max_retries {
                return Err(FocusError::IterationLimit {
                    stage: LimitStage::PeakSearch,
                    limit: self.max_retries,
                });
            }
            if !image.contains_window(x, y, ncut) {
                return Err(FocusError::EdgeProximity {
                    x,
                    y,
                    margin: ncut,
                    width: image.width(),
                    height: image.height(),
                });
            }
            match self.scan_neighborhood(image, x, y, sky)? {
                Neighborhood::Maximum(grid) => break grid,
                Neighborhood::Brighter { dx, dy } => {
                    retries += 1;
                    // The window check above keeps both coordinates >= ncut >= 1.
                    x = x.wrapping_add_signed(dx);
                    y = y.wrapping_add_signed(dy);
                    trace_step!("peak_relocated", retries = retries, x = x, y = y);
                }
            }
        };

        let moments = interpolate(&grid, x, y)?;
        Ok(PeakFit {
            moments,
            retries,
            x,
            y,
        })
    }

    /// Evaluates the center, then the neighbors in row-major order, stopping
    /// at the first neighbor brighter than the center.
    fn scan_neighborhood<T: Sample>(
        &self,
        image: ImageView<'_, T>,
        x: usize,
        y: usize,
        sky: i64,
    ) -> FocusResult<Neighborhood> {
        // Neighbors sit one pixel closer to an edge, so they need only the
        // tap footprint.
        let reach = self.evaluator.kernel().ncut() - 1;
        let center = self.evaluator.evaluate_within(image, x, y, sky, reach)?;
        let mut grid = [[center; 3]; 3];
        for (row, dy) in (-1isize..=1).enumerate() {
            for (col, dx) in (-1isize..=1).enumerate() {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let m = self.evaluator.evaluate_within(
                    image,
                    x.wrapping_add_signed(dx),
                    y.wrapping_add_signed(dy),
                    sky,
                    reach,
                )?;
                if m.filval > center.filval {
                    return Ok(Neighborhood::Brighter { dx, dy });
                }
                grid[row][col] = m;
            }
        }
        Ok(Neighborhood::Maximum(grid))
    }
}

enum Neighborhood {
    Maximum([[GaussianMoments; 3]; 3]),
    Brighter { dx: isize, dy: isize },
}

fn stencil(
    grid: &[[GaussianMoments; 3]; 3],
    field: fn(&GaussianMoments) -> f64,
) -> [[f64; 3]; 3] {
    let mut s = [[0.0f64; 3]; 3];
    for (row, cells) in grid.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            s[row][col] = field(cell);
        }
    }
    s
}

fn interpolate(
    grid: &[[GaussianMoments; 3]; 3],
    x: usize,
    y: usize,
) -> FocusResult<GaussianMoments> {
    use PeakDirection::{AntiDiagonal, Diagonal, Horizontal, Vertical};

    let flux = stencil(grid, |m| m.filval);
    let fit = |direction| {
        let parabola = fit_direction(&flux, direction);
        parabola
            .peak_offset(FLAT_PEAK_EPS)
            .map(|offset| (parabola, offset))
            .ok_or(FocusError::FlatPeak { direction })
    };
    let (px, dx) = fit(Horizontal)?;
    let (py, dy) = fit(Vertical)?;
    let (_, dp) = fit(Diagonal)?;
    let (_, dm) = fit(AntiDiagonal)?;

    let xmom = stencil(grid, |m| m.xmom);
    let ymom = stencil(grid, |m| m.ymom);
    let pmom = stencil(grid, |m| m.pmom);
    let mmom = stencil(grid, |m| m.mmom);

    Ok(GaussianMoments {
        xmom: interpolate_pair(&xmom, Horizontal, dx, Vertical, dy),
        ymom: interpolate_pair(&ymom, Horizontal, dx, Vertical, dy),
        pmom: interpolate_pair(&pmom, Diagonal, dp, AntiDiagonal, dm),
        mmom: interpolate_pair(&mmom, Diagonal, dp, AntiDiagonal, dm),
        filval: flux[1][1] + px.peak_gain() + py.peak_gain(),
        xf: x as f64 + dx + PIXEL_CENTER_OFFSET,
        yf: y as f64 + dy + PIXEL_CENTER_OFFSET,
    })
}

/// Locates the peak near `(x, y)` with default settings.
pub fn locate_peak<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: &Kernel,
) -> FocusResult<PeakFit> {
    PeakLocator::new(kernel).locate(image, x, y, sky)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    fn star(size: usize, cx: f64, cy: f64, sigma: f64) -> OwnedImage<u16> {
        OwnedImage::from_fn(size, size, |x, y| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let r2 = dx * dx + dy * dy;
            (40_000.0 * (-r2 / (2.0 * sigma * sigma)).exp()).round() as u16
        })
        .unwrap()
    }

    #[test]
    fn centered_star_needs_no_retries() {
        let img = star(41, 20.0, 20.0, 1.5);
        let kernel = Kernel::generate(1.5).unwrap();
        let fit = locate_peak(img.view(), 20, 20, 0, &kernel).unwrap();
        assert_eq!(fit.retries, 0);
        assert!((fit.moments.xf - 20.5).abs() < 1e-6);
        assert!((fit.moments.yf - 20.5).abs() < 1e-6);
    }

    #[test]
    fn off_peak_guess_walks_to_maximum() {
        let img = star(41, 20.0, 20.0, 1.5);
        let kernel = Kernel::generate(1.5).unwrap();
        let fit = locate_peak(img.view(), 17, 22, 0, &kernel).unwrap();
        assert!(fit.retries >= 3, "retries {}", fit.retries);
        assert_eq!((fit.x, fit.y), (20, 20));
    }

    #[test]
    fn retry_budget_is_enforced() {
        let img = star(41, 20.0, 20.0, 1.5);
        let kernel = Kernel::generate(1.5).unwrap();
        let err = PeakLocator::new(&kernel)
            .with_max_retries(2)
            .locate(img.view(), 15, 20, 0)
            .unwrap_err();
        assert_eq!(
            err,
            FocusError::IterationLimit {
                stage: LimitStage::PeakSearch,
                limit: 2
            }
        );
    }

    #[test]
    fn fractional_center_is_recovered() {
        let img = star(41, 20.3, 19.8, 1.6);
        let kernel = Kernel::generate(1.6).unwrap();
        let fit = locate_peak(img.view(), 20, 20, 0, &kernel).unwrap();
        assert!((fit.moments.xf - 20.8).abs() < 0.05, "xf {}", fit.moments.xf);
        assert!((fit.moments.yf - 20.3).abs() < 0.05, "yf {}", fit.moments.yf);
    }
}
