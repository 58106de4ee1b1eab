//! gaussfocus measures star widths and focus moments with matched Gaussian
//! filters.
//!
//! The pipeline generates a fixed-point Gaussian kernel ([`Kernel`]),
//! evaluates Gaussian-weighted second moments around integer pixels
//! ([`MomentEvaluator`]), refines the smoothed peak to sub-pixel precision
//! ([`PeakLocator`]), and iterates the filter width until the focus
//! statistic `xmom + ymom` vanishes ([`SigmaSolver`]). Kernels are plain
//! values, so measurements on a shared image can run concurrently; the
//! `rayon` feature adds a parallel batch driver.

pub mod batch;
pub mod filter;
pub mod image;
pub mod moments;
pub mod peak;
mod refine;
pub mod solver;
pub mod status;
mod trace;
pub mod util;

pub use crate::batch::{measure_batch, BatchSummary, StarSeed};
pub use crate::filter::{FilterTable, Kernel, MAX_SIGMA, MAX_TAPS};
pub use crate::image::{ImageView, OwnedImage, Sample};
pub use crate::moments::{evaluate_moments, Accumulation, GaussianMoments, MomentEvaluator};
pub use crate::peak::{locate_peak, PeakFit, PeakLocator};
pub use crate::solver::{solve_sigma, SigmaSolution, SigmaSolver, SolverConfig};
pub use crate::util::{FocusError, FocusResult, LimitStage, PeakDirection};

#[cfg(feature = "rayon")]
pub use crate::batch::measure_batch_par;

#[cfg(feature = "image-io")]
pub use crate::image::io;
