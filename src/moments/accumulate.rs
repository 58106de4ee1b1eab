//! Ring-by-ring accumulation of the four Gaussian-weighted sums.
//!
//! Ring `i` covers rows `y + i` and `y - i` (only the central row for
//! `i = 0`); within a ring the row taps `j = 1..ncut` pair columns `x + j`
//! and `x - j`. Each ring yields three partials which are then weighted by
//! the ring's own tap.

use crate::filter::Kernel;
use crate::image::{ImageView, Sample};
use crate::util::{FocusError, FocusResult};

/// Per-ring partial above which the legacy register shifts before multiplying.
const SHIFT_THRESHOLD: i128 = 0xF_FFFF;
const RING_SHIFT: u32 = 8;
const FINAL_SHIFT: u32 = 5;

/// Scale that maps exact sums onto the legacy register scale.
pub(crate) const WIDE_TO_LEGACY: f64 = (1u32 << (RING_SHIFT + FINAL_SHIFT)) as f64;

/// Overflow policy for combining ring partials into running totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Accumulation {
    /// Exact 128-bit totals; `filval` is rescaled to the legacy range.
    #[default]
    Wide,
    /// Range-limited register: per-ring right shift by 8 (before the
    /// multiply when the partial exceeds `2^20`, after it otherwise) and a
    /// final shift by 5.
    Shifted,
}

/// Raw weighted sums around one integer pixel.
///
/// Ring partials are kept in 128 bits as well, so any `i64` sky level is
/// accepted without overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RawSums {
    pub(crate) sum: i128,
    pub(crate) x2sum: i128,
    pub(crate) y2sum: i128,
    pub(crate) xysum: i128,
}

#[derive(Clone, Copy, Debug, Default)]
struct RingPartials {
    lsum: i128,
    lxsum: i128,
    lx2sum: i128,
}

/// Accumulates the sums with the footprint `[x - reach, x + reach]` x
/// `[y - reach, y + reach]`, where `reach = ncut - 1`.
///
/// The caller has already checked that the footprint lies inside `image`;
/// a row that is nevertheless missing is reported as `EdgeProximity`.
pub(crate) fn accumulate<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: &Kernel,
    mode: Accumulation,
) -> FocusResult<RawSums> {
    let ncut = kernel.ncut();
    let reach = ncut - 1;
    let g = kernel.gauss();
    let xg = kernel.xgauss();
    let x2g = kernel.x2gauss();

    let edge_err = || FocusError::EdgeProximity {
        x,
        y,
        margin: reach,
        width: image.width(),
        height: image.height(),
    };

    let mut totals = RawSums::default();
    for i in 0..ncut {
        let upper = window(image, y + i, x, reach).ok_or_else(edge_err)?;
        let lower = y
            .checked_sub(i)
            .and_then(|row_y| window(image, row_y, x, reach))
            .ok_or_else(edge_err)?;
        let ring = if i == 0 {
            central_ring(upper, reach, sky, g, x2g)
        } else {
            outer_ring(upper, lower, reach, sky, g, xg, x2g)
        };
        match mode {
            Accumulation::Wide => add_wide(&mut totals, ring, g[i], xg[i], x2g[i]),
            Accumulation::Shifted => add_shifted(&mut totals, ring, g[i], xg[i], x2g[i]),
        }
    }

    if mode == Accumulation::Shifted {
        totals.sum >>= FINAL_SHIFT;
        totals.x2sum >>= FINAL_SHIFT;
        totals.y2sum >>= FINAL_SHIFT;
        totals.xysum >>= FINAL_SHIFT;
    }
    Ok(totals)
}

fn window<T>(image: ImageView<'_, T>, row_y: usize, x: usize, reach: usize) -> Option<&[T]> {
    let row = image.row(row_y)?;
    row.get(x.checked_sub(reach)?..=x.checked_add(reach)?)
}

/// Ring 0: the central row only, so nothing is counted twice. Its cross
/// partial is zero because `xgauss[0]` is zero.
fn central_ring<T: Sample>(
    row: &[T],
    c: usize,
    sky: i64,
    g: &[i32],
    x2g: &[i32],
) -> RingPartials {
    let sky = i128::from(sky);
    let mut lsum = (wide(row[c]) - sky) * i128::from(g[0]);
    let mut lx2sum = 0i128;
    for j in 1..g.len() {
        let psum = wide(row[c + j]) + wide(row[c - j]) - 2 * sky;
        lsum += psum * i128::from(g[j]);
        lx2sum += psum * i128::from(x2g[j]);
    }
    RingPartials {
        lsum,
        lxsum: 0,
        lx2sum,
    }
}

fn outer_ring<T: Sample>(
    upper: &[T],
    lower: &[T],
    c: usize,
    sky: i64,
    g: &[i32],
    xg: &[i32],
    x2g: &[i32],
) -> RingPartials {
    let sky = i128::from(sky);
    let mut lsum = (wide(upper[c]) + wide(lower[c]) - 2 * sky) * i128::from(g[0]);
    let mut lxsum = 0i128;
    let mut lx2sum = 0i128;
    for j in 1..g.len() {
        let pp = wide(upper[c + j]);
        let pm = wide(upper[c - j]);
        let mp = wide(lower[c + j]);
        let mm = wide(lower[c - j]);
        let psum = pp + pm + mp + mm - 4 * sky;
        lsum += psum * i128::from(g[j]);
        lxsum += (pp - pm - mp + mm) * i128::from(xg[j]);
        lx2sum += psum * i128::from(x2g[j]);
    }
    RingPartials {
        lsum,
        lxsum,
        lx2sum,
    }
}

fn wide<T: Sample>(v: T) -> i128 {
    i128::from(v.to_i64())
}

fn add_wide(totals: &mut RawSums, ring: RingPartials, g: i32, xg: i32, x2g: i32) {
    totals.sum += ring.lsum * i128::from(g);
    totals.y2sum += ring.lsum * i128::from(x2g);
    totals.x2sum += ring.lx2sum * i128::from(g);
    totals.xysum += ring.lxsum * i128::from(xg);
}

fn add_shifted(totals: &mut RawSums, ring: RingPartials, g: i32, xg: i32, x2g: i32) {
    let (g, xg, x2g) = (i128::from(g), i128::from(xg), i128::from(x2g));
    let (sum, y2sum, x2sum, xysum) = if ring.lsum > SHIFT_THRESHOLD {
        let lsum = ring.lsum >> RING_SHIFT;
        let lxsum = ring.lxsum >> RING_SHIFT;
        let lx2sum = ring.lx2sum >> RING_SHIFT;
        (lsum * g, lsum * x2g, lx2sum * g, lxsum * xg)
    } else {
        (
            (ring.lsum * g) >> RING_SHIFT,
            (ring.lsum * x2g) >> RING_SHIFT,
            (ring.lx2sum * g) >> RING_SHIFT,
            (ring.lxsum * xg) >> RING_SHIFT,
        )
    };
    totals.sum += sum;
    totals.y2sum += y2sum;
    totals.x2sum += x2sum;
    totals.xysum += xysum;
}
