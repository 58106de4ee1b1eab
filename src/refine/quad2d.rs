//! Directional quadratic fits over a 3x3 stencil.
//!
//! The stencil is indexed `s[row][col]` with the center at `s[1][1]`; row
//! grows with y and column with x.

use crate::refine::quad1d::Parabola;
use crate::util::PeakDirection;

/// Fits a parabola through the stencil along `direction`.
///
/// The positive end of each direction is `(x+1, y)`, `(x, y+1)`,
/// `(x+1, y+1)` and `(x-1, y+1)` respectively.
pub(crate) fn fit_direction(s: &[[f64; 3]; 3], direction: PeakDirection) -> Parabola {
    let (minus, plus) = match direction {
        PeakDirection::Horizontal => (s[1][0], s[1][2]),
        PeakDirection::Vertical => (s[0][1], s[2][1]),
        PeakDirection::Diagonal => (s[0][0], s[2][2]),
        PeakDirection::AntiDiagonal => (s[0][2], s[2][0]),
    };
    Parabola::fit(minus, s[1][1], plus)
}

/// Interpolates a stencil to offsets `ta` and `tb` along two directions,
/// fitting each direction independently.
pub(crate) fn interpolate_pair(
    s: &[[f64; 3]; 3],
    a: PeakDirection,
    ta: f64,
    b: PeakDirection,
    tb: f64,
) -> f64 {
    s[1][1] + fit_direction(s, a).increment(ta) + fit_direction(s, b).increment(tb)
}
