//! Discrete Gaussian filter and its moment-weighted companions.
//!
//! A [`Kernel`] tabulates one half of a symmetric 1D Gaussian scaled so the
//! center tap is about 512, together with the first-order (`i * g / sigma`)
//! and second-order (`g * (i / sigma)^2`) weights used to form second
//! moments. The value at the first tap past the cutoff is subtracted from
//! every tap so the filter decays to zero instead of ending on a step.
//!
//! [`FilterTable`] keeps the most recently generated kernel and skips
//! regeneration when asked for the same sigma again. It is a plain value:
//! each measurement owns its own table.

use crate::util::{FocusError, FocusResult};

/// Fixed capacity of every kernel array.
pub const MAX_TAPS: usize = 50;

/// Largest sigma a kernel can be generated for.
pub const MAX_SIGMA: f64 = 12.0;

/// Scale of the center tap.
const CENTER_SCALE: f64 = 512.0;

/// Scaled integer Gaussian and moment weights for one sigma.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    sigma: f64,
    ncut: usize,
    gauss: [i32; MAX_TAPS],
    xgauss: [i32; MAX_TAPS],
    x2gauss: [i32; MAX_TAPS],
}

impl Kernel {
    /// Generates the kernel for `sigma`, which must lie in `(0, 12]`.
    pub fn generate(sigma: f64) -> FocusResult<Self> {
        if !(sigma > 0.0 && sigma <= MAX_SIGMA) {
            return Err(FocusError::InvalidSigma { sigma });
        }

        // floor(4 sigma + 1.5); at most 49 for sigma = 12.
        let full = (4.0 * sigma + 1.5) as usize;
        let sig2inv = 0.5 / (sigma * sigma);
        let siginv = 1.0 / sigma;
        let edge = CENTER_SCALE * (-((full * full) as f64) * sig2inv).exp();

        let mut gauss = [0i32; MAX_TAPS];
        let mut xgauss = [0i32; MAX_TAPS];
        let mut x2gauss = [0i32; MAX_TAPS];
        let mut ncut = full;
        for i in 0..full {
            let fi = i as f64;
            let isig2 = fi * fi * sig2inv;
            let g = CENTER_SCALE * (-isig2).exp() - edge + 0.5;
            gauss[i] = g as i32;
            xgauss[i] = (fi * g * siginv) as i32;
            x2gauss[i] = (2.0 * g * isig2) as i32;
            if i > 0 && x2gauss[i] == 0 {
                ncut = i;
            }
        }
        for taps in [&mut gauss, &mut xgauss, &mut x2gauss] {
            taps[ncut..].fill(0);
        }

        Ok(Self {
            sigma,
            ncut,
            gauss,
            xgauss,
            x2gauss,
        })
    }

    /// Returns the sigma this kernel was generated for.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Returns the number of meaningful taps.
    pub fn ncut(&self) -> usize {
        self.ncut
    }

    /// Zeroth-order weights, `ncut` entries.
    pub fn gauss(&self) -> &[i32] {
        &self.gauss[..self.ncut]
    }

    /// First-order weights, `ncut` entries.
    pub fn xgauss(&self) -> &[i32] {
        &self.xgauss[..self.ncut]
    }

    /// Second-order weights, `ncut` entries.
    pub fn x2gauss(&self) -> &[i32] {
        &self.x2gauss[..self.ncut]
    }

    /// Full fixed-length zeroth-order array including the zeroed tail.
    pub fn gauss_table(&self) -> &[i32; MAX_TAPS] {
        &self.gauss
    }

    /// Full fixed-length first-order array including the zeroed tail.
    pub fn xgauss_table(&self) -> &[i32; MAX_TAPS] {
        &self.xgauss
    }

    /// Full fixed-length second-order array including the zeroed tail.
    pub fn x2gauss_table(&self) -> &[i32; MAX_TAPS] {
        &self.x2gauss
    }
}

/// Cache of the last generated kernel.
#[derive(Clone, Debug, Default)]
pub struct FilterTable {
    kernel: Option<Kernel>,
}

impl FilterTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `sigma` the current filter width.
    ///
    /// Returns `true` when a new kernel was generated and `false` when the
    /// cached kernel already matched. An invalid sigma leaves the cache as it
    /// was.
    pub fn set_sigma(&mut self, sigma: f64) -> FocusResult<bool> {
        if self.kernel.as_ref().is_some_and(|k| k.sigma == sigma) {
            return Ok(false);
        }
        let kernel = Kernel::generate(sigma)?;
        self.kernel = Some(kernel);
        Ok(true)
    }

    /// Returns the current kernel, if any sigma has been set.
    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }

    /// Returns the sigma of the current kernel.
    pub fn sigma(&self) -> Option<f64> {
        self.kernel.as_ref().map(Kernel::sigma)
    }
}
