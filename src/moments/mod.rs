//! Gaussian-weighted moments around an integer pixel.
//!
//! The four moments are the normalized responses of the image to the
//! Gaussian filter multiplied by the second-order orthogonal polynomials
//! `2(x/s)^2 - 1` (horizontal), `2(y/s)^2 - 1` (vertical) and their two
//! diagonal counterparts. For a Gaussian source whose width equals the
//! filter sigma, `xmom + ymom` vanishes.

mod accumulate;

pub use accumulate::Accumulation;

use crate::filter::Kernel;
use crate::image::{ImageView, Sample};
use crate::util::{FocusError, FocusResult};
use accumulate::{accumulate, RawSums, WIDE_TO_LEGACY};

/// Offset from integer pixel indices to the reported coordinate convention,
/// in which a source centered on pixel `(i, j)` sits at `(i + 0.5, j + 0.5)`.
pub const PIXEL_CENTER_OFFSET: f64 = 0.5;

/// Normalized Gaussian-weighted moments of a source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GaussianMoments {
    /// Horizontal second moment.
    pub xmom: f64,
    /// Vertical second moment.
    pub ymom: f64,
    /// Moment along the `x = y` diagonal.
    pub pmom: f64,
    /// Moment along the `x = -y` diagonal.
    pub mmom: f64,
    /// Gaussian-weighted flux above sky.
    pub filval: f64,
    /// Peak x coordinate.
    pub xf: f64,
    /// Peak y coordinate.
    pub yf: f64,
}

impl GaussianMoments {
    /// Sum of the horizontal and vertical moments; zero when the filter
    /// sigma matches the source.
    pub fn focus_statistic(&self) -> f64 {
        self.xmom + self.ymom
    }

    /// Checks that every moment lies strictly inside `(-1, 1)`.
    pub fn check_range(&self) -> FocusResult<()> {
        for (moment, value) in [
            ("xmom", self.xmom),
            ("ymom", self.ymom),
            ("pmom", self.pmom),
            ("mmom", self.mmom),
        ] {
            if !(value > -1.0 && value < 1.0) {
                return Err(FocusError::OutOfRange { moment, value });
            }
        }
        Ok(())
    }

    fn from_sums(sums: RawSums, scale: f64, x: usize, y: usize) -> FocusResult<Self> {
        if sums.sum == 0 {
            return Err(FocusError::DegenerateIntegral { x, y });
        }
        let fsum = sums.sum as f64;
        let x2 = sums.x2sum as f64;
        let y2 = sums.y2sum as f64;
        let xy = sums.xysum as f64;
        Ok(Self {
            xmom: (2.0 * x2 - fsum) / fsum,
            ymom: (2.0 * y2 - fsum) / fsum,
            pmom: (x2 - 2.0 * xy + y2 - fsum) / fsum,
            mmom: (x2 + 2.0 * xy + y2 - fsum) / fsum,
            filval: fsum / scale,
            xf: x as f64 + PIXEL_CENTER_OFFSET,
            yf: y as f64 + PIXEL_CENTER_OFFSET,
        })
    }
}

/// Evaluates moments for one kernel.
#[derive(Clone, Copy, Debug)]
pub struct MomentEvaluator<'k> {
    kernel: &'k Kernel,
    accumulation: Accumulation,
}

impl<'k> MomentEvaluator<'k> {
    /// Creates an evaluator with exact accumulation.
    pub fn new(kernel: &'k Kernel) -> Self {
        Self {
            kernel,
            accumulation: Accumulation::default(),
        }
    }

    /// Selects the overflow policy.
    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Returns the kernel in use.
    pub fn kernel(&self) -> &'k Kernel {
        self.kernel
    }

    /// Returns the overflow policy in use.
    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    /// Evaluates the moments at `(x, y)` with `sky` subtracted from every
    /// sample.
    ///
    /// `(x, y)` must be at least `ncut` pixels from every image edge.
    pub fn evaluate<T: Sample>(
        &self,
        image: ImageView<'_, T>,
        x: usize,
        y: usize,
        sky: i64,
    ) -> FocusResult<GaussianMoments> {
        self.evaluate_within(image, x, y, sky, self.kernel.ncut())
    }

    /// Evaluates with an explicit edge margin; `margin` must cover the tap
    /// footprint `ncut - 1`.
    pub(crate) fn evaluate_within<T: Sample>(
        &self,
        image: ImageView<'_, T>,
        x: usize,
        y: usize,
        sky: i64,
        margin: usize,
    ) -> FocusResult<GaussianMoments> {
        debug_assert!(margin + 1 >= self.kernel.ncut());
        if !image.contains_window(x, y, margin) {
            return Err(FocusError::EdgeProximity {
                x,
                y,
                margin,
                width: image.width(),
                height: image.height(),
            });
        }
        let sums = accumulate(image, x, y, sky, self.kernel, self.accumulation)?;
        let scale = match self.accumulation {
            Accumulation::Wide => WIDE_TO_LEGACY,
            Accumulation::Shifted => 1.0,
        };
        GaussianMoments::from_sums(sums, scale, x, y)
    }
}

/// Evaluates the moments at `(x, y)` with exact accumulation.
pub fn evaluate_moments<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: &Kernel,
) -> FocusResult<GaussianMoments> {
    MomentEvaluator::new(kernel).evaluate(image, x, y, sky)
}
