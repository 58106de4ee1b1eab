//! Integer status-code surface for callers that dispatch on return codes.
//!
//! Each function wraps the typed API and reports the outcome as
//! `(value, code)`: code `0` (or the retry count for
//! [`find_focus_moments`]) on success, a negative code on failure.
//!
//! | function | codes |
//! |---|---|
//! | [`set_filter_sigma`] | -1 sigma outside (0, 12] |
//! | [`evaluate_focus_moments`] | -1 too close to edge, -2 zero integral |
//! | [`find_focus_moments`] | -1 edge or retry limit, -2 moment error, -3 flat peak |
//! | [`solve_focus_sigma`] | -1 invalid sigma, -2 moment out of range, -3 iteration limit, -4 edge, -5 moment error, -6 flat peak |
//!
//! The interpolated peak flux returned by [`find_focus_moments`] and
//! [`solve_focus_sigma`] is divided by [`PEAK_FILVAL_SCALE`], so it is on
//! the legacy scale of those codes. The typed API ([`crate::locate_peak`],
//! [`crate::solve_sigma`]) keeps the unscaled value, which is comparable
//! with the `filval` of [`evaluate_focus_moments`].

use crate::filter::{FilterTable, Kernel};
use crate::image::{ImageView, Sample};
use crate::moments::{evaluate_moments, GaussianMoments};
use crate::peak::locate_peak;
use crate::solver::{solve_sigma, DEFAULT_SIGMA};

/// Status code for success.
pub const STATUS_OK: i32 = 0;

/// Divisor applied to the interpolated peak flux on this surface.
pub const PEAK_FILVAL_SCALE: f64 = 32.0;

fn legacy_peak(mut moments: GaussianMoments) -> GaussianMoments {
    moments.filval /= PEAK_FILVAL_SCALE;
    moments
}

/// Sets the filter width of `table`.
pub fn set_filter_sigma(table: &mut FilterTable, sigma: f64) -> i32 {
    match table.set_sigma(sigma) {
        Ok(_) => STATUS_OK,
        Err(_) => -1,
    }
}

/// Evaluates moments at an integer pixel.
pub fn evaluate_focus_moments<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: &Kernel,
) -> (Option<GaussianMoments>, i32) {
    match evaluate_moments(image, x, y, sky, kernel) {
        Ok(m) => (Some(m), STATUS_OK),
        Err(err) => (None, err.evaluate_status()),
    }
}

/// Finds the sub-pixel peak and interpolated moments; a non-negative code
/// is the number of relocations used.
pub fn find_focus_moments<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: &Kernel,
) -> (Option<GaussianMoments>, i32) {
    match locate_peak(image, x, y, sky, kernel) {
        Ok(fit) => {
            let code = i32::try_from(fit.retries).unwrap_or(i32::MAX);
            (Some(legacy_peak(fit.moments)), code)
        }
        Err(err) => (None, err.find_status()),
    }
}

/// Solves for sigma. A negative `sigma` on input selects the default guess;
/// on success `sigma` holds the matched width.
pub fn solve_focus_sigma<T: Sample>(
    image: ImageView<'_, T>,
    x: usize,
    y: usize,
    sky: i64,
    sigma: &mut f64,
) -> (Option<GaussianMoments>, i32) {
    if *sigma < 0.0 {
        *sigma = DEFAULT_SIGMA;
    }
    match solve_sigma(image, x, y, sky, Some(*sigma)) {
        Ok(solution) => {
            *sigma = solution.sigma;
            (Some(legacy_peak(solution.moments)), STATUS_OK)
        }
        Err(err) => (None, err.solve_status()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    fn star() -> OwnedImage<u16> {
        OwnedImage::from_fn(41, 41, |x, y| {
            let r2 = (x as f64 - 20.0).powi(2) + (y as f64 - 20.0).powi(2);
            (30_000.0 * (-r2 / 4.5).exp()).round() as u16
        })
        .unwrap()
    }

    #[test]
    fn filter_codes() {
        let mut table = FilterTable::new();
        assert_eq!(set_filter_sigma(&mut table, 12.0), 0);
        assert_eq!(set_filter_sigma(&mut table, 12.01), -1);
        assert_eq!(set_filter_sigma(&mut table, 0.0), -1);
    }

    #[test]
    fn edge_codes_per_operation() {
        let img = star();
        let kernel = Kernel::generate(1.5).unwrap();
        assert_eq!(evaluate_focus_moments(img.view(), 2, 20, 0, &kernel).1, -1);
        assert_eq!(find_focus_moments(img.view(), 2, 20, 0, &kernel).1, -1);
        let mut sigma = 1.5;
        assert_eq!(solve_focus_sigma(img.view(), 2, 20, 0, &mut sigma).1, -4);
    }

    #[test]
    fn solve_writes_back_sigma() {
        let img = star();
        let mut sigma = -1.0;
        let (moments, code) = solve_focus_sigma(img.view(), 20, 20, 0, &mut sigma);
        assert_eq!(code, 0);
        assert!(moments.is_some());
        assert!((sigma - 1.5).abs() < 0.01, "sigma {sigma}");
    }

    #[test]
    fn flat_patch_codes() {
        let img = OwnedImage::from_fn(41, 41, |_, _| 500u16).unwrap();
        let kernel = Kernel::generate(1.5).unwrap();
        assert_eq!(find_focus_moments(img.view(), 20, 20, 0, &kernel).1, -3);
        assert_eq!(
            evaluate_focus_moments(img.view(), 20, 20, 500, &kernel).1,
            -2
        );
    }

    #[test]
    fn peak_flux_is_on_the_legacy_scale() {
        let img = star();
        let kernel = Kernel::generate(1.5).unwrap();
        let fit = locate_peak(img.view(), 20, 20, 0, &kernel).unwrap();
        let (found, code) = find_focus_moments(img.view(), 20, 20, 0, &kernel);
        assert_eq!(code, 0);
        let found = found.unwrap();
        assert_eq!(found.filval, fit.moments.filval / PEAK_FILVAL_SCALE);
        assert_eq!(found.xf, fit.moments.xf);
        assert_eq!(found.xmom, fit.moments.xmom);

        let (at_center, _) = evaluate_focus_moments(img.view(), 20, 20, 0, &kernel);
        let ratio = at_center.unwrap().filval / found.filval;
        assert!((ratio - PEAK_FILVAL_SCALE).abs() < 0.5, "ratio {ratio}");

        let mut sigma = 1.5;
        let (solved, _) = solve_focus_sigma(img.view(), 20, 20, 0, &mut sigma);
        let typed = solve_sigma(img.view(), 20, 20, 0, Some(1.5)).unwrap();
        assert_eq!(solved.unwrap().filval, typed.moments.filval / PEAK_FILVAL_SCALE);
    }
}
