//! Error types for gaussfocus.

use std::fmt;
use thiserror::Error;

/// Result alias for gaussfocus operations.
pub type FocusResult<T> = std::result::Result<T, FocusError>;

/// Direction of a 1D quadratic fit through the 3x3 peak neighborhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeakDirection {
    /// Along the row (x).
    Horizontal,
    /// Along the column (y).
    Vertical,
    /// Through `(-1, -1)` and `(+1, +1)`.
    Diagonal,
    /// Through `(+1, -1)` and `(-1, +1)`.
    AntiDiagonal,
}

impl fmt::Display for PeakDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeakDirection::Horizontal => "horizontal",
            PeakDirection::Vertical => "vertical",
            PeakDirection::Diagonal => "diagonal",
            PeakDirection::AntiDiagonal => "anti-diagonal",
        };
        f.write_str(name)
    }
}

/// Bounded loop that ran out of budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitStage {
    /// Relocating the integer center toward the smoothed maximum.
    PeakSearch,
    /// Iterating sigma toward a vanishing focus statistic.
    SigmaSolve,
}

impl fmt::Display for LimitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitStage::PeakSearch => f.write_str("peak search"),
            LimitStage::SigmaSolve => f.write_str("sigma solve"),
        }
    }
}

/// Errors that can occur when measuring focus moments.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FocusError {
    /// Filter sigma outside `(0, 12]`.
    #[error("invalid filter sigma {sigma}: must lie in (0, 12]")]
    InvalidSigma { sigma: f64 },
    /// The filter footprint around `(x, y)` leaves the image.
    #[error("position ({x}, {y}) is closer than {margin} px to the edge of a {width}x{height} image")]
    EdgeProximity {
        x: usize,
        y: usize,
        margin: usize,
        width: usize,
        height: usize,
    },
    /// The Gaussian-weighted flux is exactly zero; usually a bad sky value.
    #[error("zero Gaussian integral at ({x}, {y}); check the sky value")]
    DegenerateIntegral { x: usize, y: usize },
    /// Curvature of the smoothed peak is too small to localize it.
    #[error("peak is too flat along the {direction} direction")]
    FlatPeak { direction: PeakDirection },
    /// A normalized moment reached unit magnitude.
    #[error("moment {moment} = {value} is outside (-1, 1)")]
    OutOfRange { moment: &'static str, value: f64 },
    /// A bounded loop exhausted its budget.
    #[error("{stage} did not converge within {limit} iterations")]
    IterationLimit { stage: LimitStage, limit: usize },
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the image width.
    #[error("stride {stride} is smaller than width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer cannot hold the described image.
    #[error("buffer too small: needed {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A configuration value is unusable.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// Image decoding failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}

impl FocusError {
    /// Returns true for failures that mean "no measurement for this source"
    /// rather than a caller mistake.
    pub fn is_measurement_failure(&self) -> bool {
        matches!(
            self,
            FocusError::EdgeProximity { .. }
                | FocusError::DegenerateIntegral { .. }
                | FocusError::FlatPeak { .. }
                | FocusError::OutOfRange { .. }
                | FocusError::IterationLimit { .. }
        )
    }

    /// Status code for a failed evaluation at a single integer pixel.
    pub fn evaluate_status(&self) -> i32 {
        match self {
            FocusError::DegenerateIntegral { .. } => -2,
            _ => -1,
        }
    }

    /// Status code for a failed sub-pixel peak search.
    pub fn find_status(&self) -> i32 {
        match self {
            FocusError::DegenerateIntegral { .. } => -2,
            FocusError::FlatPeak { .. } => -3,
            _ => -1,
        }
    }

    /// Status code for a failed sigma solve.
    pub fn solve_status(&self) -> i32 {
        match self {
            FocusError::InvalidSigma { .. } => -1,
            FocusError::OutOfRange { .. } => -2,
            FocusError::IterationLimit {
                stage: LimitStage::SigmaSolve,
                ..
            } => -3,
            FocusError::DegenerateIntegral { .. } => -5,
            FocusError::FlatPeak { .. } => -6,
            _ => -4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_status_follows_find_status_offset() {
        let cases = [
            FocusError::EdgeProximity {
                x: 1,
                y: 1,
                margin: 5,
                width: 10,
                height: 10,
            },
            FocusError::DegenerateIntegral { x: 3, y: 4 },
            FocusError::FlatPeak {
                direction: PeakDirection::Vertical,
            },
            FocusError::IterationLimit {
                stage: LimitStage::PeakSearch,
                limit: 15,
            },
        ];
        for err in cases {
            assert_eq!(err.solve_status(), err.find_status() - 3, "{err}");
        }
    }

    #[test]
    fn solve_status_codes_for_solver_failures() {
        assert_eq!(FocusError::InvalidSigma { sigma: 13.0 }.solve_status(), -1);
        let err = FocusError::OutOfRange {
            moment: "xmom",
            value: 1.2,
        };
        assert_eq!(err.solve_status(), -2);
        let err = FocusError::IterationLimit {
            stage: LimitStage::SigmaSolve,
            limit: 10,
        };
        assert_eq!(err.solve_status(), -3);
    }

    #[test]
    fn caller_errors_are_not_measurement_failures() {
        assert!(!FocusError::InvalidStride { width: 4, stride: 3 }.is_measurement_failure());
        assert!(FocusError::DegenerateIntegral { x: 0, y: 0 }.is_measurement_failure());
    }
}
