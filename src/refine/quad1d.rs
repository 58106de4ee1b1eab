//! Three-point quadratic fits for sub-pixel interpolation.

/// Parabola through samples at `t = -1, 0, +1`.
///
/// Written as `f(t) = center + slope * t - 0.5 * curvature * t^2`, so a
/// maximum has positive `curvature`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Parabola {
    pub(crate) center: f64,
    pub(crate) slope: f64,
    pub(crate) curvature: f64,
}

impl Parabola {
    /// Fits the parabola through `(minus, center, plus)`.
    pub(crate) fn fit(minus: f64, center: f64, plus: f64) -> Self {
        Self {
            center,
            slope: 0.5 * (plus - minus),
            curvature: 2.0 * center - plus - minus,
        }
    }

    /// Offset of the maximum, or `None` when the curvature is below `eps`.
    pub(crate) fn peak_offset(&self, eps: f64) -> Option<f64> {
        if self.curvature < eps {
            return None;
        }
        Some(self.slope / self.curvature)
    }

    /// Change from `center` when moving to `t`.
    pub(crate) fn increment(&self, t: f64) -> f64 {
        self.slope * t - 0.5 * self.curvature * t * t
    }

    /// Height gained at the fitted maximum, `slope^2 / (2 * curvature)`.
    pub(crate) fn peak_gain(&self) -> f64 {
        0.5 * self.slope * self.slope / self.curvature
    }
}
