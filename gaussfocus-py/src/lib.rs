//! Python bindings for the gaussfocus focus measurement library.
//!
//! Images are passed as 2D `uint16` numpy arrays (height x width) and are
//! borrowed for the duration of each call.

use numpy::{PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use gaussfocus::{
    Accumulation as RustAccumulation, FocusError, GaussianMoments as RustGaussianMoments,
    ImageView, Kernel as RustKernel, MomentEvaluator, PeakLocator,
    SigmaSolution as RustSigmaSolution, SigmaSolver, SolverConfig as RustSolverConfig, StarSeed,
};

/// Convert a FocusError to a Python exception.
fn to_py_err(err: FocusError) -> PyErr {
    match err {
        FocusError::InvalidSigma { .. }
        | FocusError::InvalidConfig { .. }
        | FocusError::InvalidDimensions { .. }
        | FocusError::InvalidStride { .. }
        | FocusError::BufferTooSmall { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn view<'a>(image: &'a PyReadonlyArray2<'_, u16>) -> PyResult<ImageView<'a, u16>> {
    let shape = image.shape();
    let height = shape[0];
    let width = shape[1];
    let data = image.as_slice()?;
    ImageView::from_slice(data, width, height).map_err(to_py_err)
}

fn parse_accumulation(name: &str) -> PyResult<RustAccumulation> {
    match name.to_lowercase().as_str() {
        "wide" => Ok(RustAccumulation::Wide),
        "shifted" => Ok(RustAccumulation::Shifted),
        _ => Err(PyValueError::new_err(
            "accumulation must be 'wide' or 'shifted'",
        )),
    }
}

/// Fixed-point Gaussian filter weights for one sigma.
#[pyclass]
#[derive(Clone)]
pub struct Kernel {
    inner: RustKernel,
}

#[pymethods]
impl Kernel {
    /// Generate the weights for `sigma` in (0, 12].
    #[new]
    fn new(sigma: f64) -> PyResult<Self> {
        let inner = RustKernel::generate(sigma).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn sigma(&self) -> f64 {
        self.inner.sigma()
    }

    /// Number of taps in use.
    #[getter]
    fn ncut(&self) -> usize {
        self.inner.ncut()
    }

    #[getter]
    fn gauss(&self) -> Vec<i32> {
        self.inner.gauss().to_vec()
    }

    #[getter]
    fn xgauss(&self) -> Vec<i32> {
        self.inner.xgauss().to_vec()
    }

    #[getter]
    fn x2gauss(&self) -> Vec<i32> {
        self.inner.x2gauss().to_vec()
    }

    fn __repr__(&self) -> String {
        format!(
            "Kernel(sigma={}, ncut={})",
            self.inner.sigma(),
            self.inner.ncut()
        )
    }
}

/// Normalized second moments and the sub-pixel center.
#[pyclass]
#[derive(Clone)]
pub struct GaussianMoments {
    #[pyo3(get)]
    pub xmom: f64,
    #[pyo3(get)]
    pub ymom: f64,
    #[pyo3(get)]
    pub pmom: f64,
    #[pyo3(get)]
    pub mmom: f64,
    /// Smoothed flux at the center.
    #[pyo3(get)]
    pub filval: f64,
    /// Column coordinate, pixel centers at +0.5.
    #[pyo3(get)]
    pub xf: f64,
    /// Row coordinate, pixel centers at +0.5.
    #[pyo3(get)]
    pub yf: f64,
}

#[pymethods]
impl GaussianMoments {
    /// `xmom + ymom`; zero when the filter matches the source.
    fn focus_statistic(&self) -> f64 {
        self.xmom + self.ymom
    }

    fn __repr__(&self) -> String {
        format!(
            "GaussianMoments(xf={:.3}, yf={:.3}, xmom={:.4}, ymom={:.4}, pmom={:.4}, mmom={:.4})",
            self.xf, self.yf, self.xmom, self.ymom, self.pmom, self.mmom
        )
    }
}

impl From<RustGaussianMoments> for GaussianMoments {
    fn from(m: RustGaussianMoments) -> Self {
        Self {
            xmom: m.xmom,
            ymom: m.ymom,
            pmom: m.pmom,
            mmom: m.mmom,
            filval: m.filval,
            xf: m.xf,
            yf: m.yf,
        }
    }
}

/// Matched filter width and its moments.
#[pyclass]
#[derive(Clone)]
pub struct SigmaSolution {
    #[pyo3(get)]
    pub sigma: f64,
    #[pyo3(get)]
    pub moments: GaussianMoments,
    #[pyo3(get)]
    pub iterations: usize,
    #[pyo3(get)]
    pub peak_retries: usize,
}

#[pymethods]
impl SigmaSolution {
    fn __repr__(&self) -> String {
        format!(
            "SigmaSolution(sigma={:.4}, iterations={}, xf={:.3}, yf={:.3})",
            self.sigma, self.iterations, self.moments.xf, self.moments.yf
        )
    }
}

impl From<RustSigmaSolution> for SigmaSolution {
    fn from(s: RustSigmaSolution) -> Self {
        Self {
            sigma: s.sigma,
            moments: s.moments.into(),
            iterations: s.iterations,
            peak_retries: s.peak_retries,
        }
    }
}

/// Configuration for the sigma solver.
#[pyclass]
#[derive(Clone)]
pub struct SolverConfig {
    inner: RustSolverConfig,
}

#[pymethods]
impl SolverConfig {
    /// Create a new SolverConfig.
    ///
    /// Args:
    ///     initial_sigma: Starting sigma; None or negative selects 1.2
    ///     max_iterations: Maximum sigma updates (default: 10)
    ///     tolerance: Convergence threshold on xmom + ymom (default: 0.01)
    ///     max_peak_retries: Peak relocations per iteration (default: 15)
    ///     accumulation: "wide" or "shifted" (default: "wide")
    #[new]
    #[pyo3(signature = (
        initial_sigma = None,
        max_iterations = 10,
        tolerance = 0.01,
        max_peak_retries = 15,
        accumulation = "wide"
    ))]
    fn new(
        initial_sigma: Option<f64>,
        max_iterations: usize,
        tolerance: f64,
        max_peak_retries: usize,
        accumulation: &str,
    ) -> PyResult<Self> {
        let inner = RustSolverConfig {
            initial_sigma,
            max_iterations,
            tolerance,
            max_peak_retries,
            accumulation: parse_accumulation(accumulation)?,
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "SolverConfig(initial_sigma={:?}, max_iterations={}, tolerance={}, max_peak_retries={})",
            self.inner.initial_sigma,
            self.inner.max_iterations,
            self.inner.tolerance,
            self.inner.max_peak_retries
        )
    }
}

/// Evaluate moments at an integer pixel.
///
/// Args:
///     image: 2D uint16 numpy array (height x width)
///     x, y: Column and row of the pixel
///     sky: Background level
///     kernel: Kernel to weight with
#[pyfunction]
fn evaluate_moments(
    image: PyReadonlyArray2<'_, u16>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: PyRef<'_, Kernel>,
) -> PyResult<GaussianMoments> {
    let view = view(&image)?;
    let moments = MomentEvaluator::new(&kernel.inner)
        .evaluate(view, x, y, sky)
        .map_err(to_py_err)?;
    Ok(moments.into())
}

/// Locate the sub-pixel peak near `(x, y)`.
///
/// Returns:
///     (GaussianMoments, number of relocations)
#[pyfunction]
fn find_focus_moments(
    image: PyReadonlyArray2<'_, u16>,
    x: usize,
    y: usize,
    sky: i64,
    kernel: PyRef<'_, Kernel>,
) -> PyResult<(GaussianMoments, usize)> {
    let view = view(&image)?;
    let fit = PeakLocator::new(&kernel.inner)
        .locate(view, x, y, sky)
        .map_err(to_py_err)?;
    Ok((fit.moments.into(), fit.retries))
}

/// Solve for the matched filter width of the source near `(x, y)`.
#[pyfunction]
#[pyo3(signature = (image, x, y, sky, config = None))]
fn solve_sigma(
    image: PyReadonlyArray2<'_, u16>,
    x: usize,
    y: usize,
    sky: i64,
    config: Option<SolverConfig>,
) -> PyResult<SigmaSolution> {
    let view = view(&image)?;
    let cfg = config.map(|c| c.inner).unwrap_or_default();
    let solution = SigmaSolver::new(cfg)
        .solve(view, x, y, sky)
        .map_err(to_py_err)?;
    Ok(solution.into())
}

/// Measure many sources; failed sources yield None.
///
/// Args:
///     image: 2D uint16 numpy array (height x width)
///     stars: List of (x, y, sky) tuples
///     config: SolverConfig (default: SolverConfig())
///     parallel: Measure sources on the rayon pool (default: False)
#[pyfunction]
#[pyo3(signature = (image, stars, config = None, parallel = false))]
fn measure_batch(
    image: PyReadonlyArray2<'_, u16>,
    stars: Vec<(usize, usize, i64)>,
    config: Option<SolverConfig>,
    parallel: bool,
) -> PyResult<Vec<Option<SigmaSolution>>> {
    let view = view(&image)?;
    let cfg = config.map(|c| c.inner).unwrap_or_default();
    let seeds: Vec<StarSeed> = stars
        .into_iter()
        .map(|(x, y, sky)| StarSeed { x, y, sky })
        .collect();
    let results = if parallel {
        gaussfocus::measure_batch_par(view, &seeds, &cfg)
    } else {
        gaussfocus::measure_batch(view, &seeds, &cfg)
    }
    .map_err(to_py_err)?;
    Ok(results
        .into_iter()
        .map(|r| r.ok().map(SigmaSolution::from))
        .collect())
}

/// Python module for Gaussian focus measurement.
#[pymodule]
fn _gaussfocus(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Kernel>()?;
    m.add_class::<GaussianMoments>()?;
    m.add_class::<SigmaSolution>()?;
    m.add_class::<SolverConfig>()?;
    m.add_function(wrap_pyfunction!(evaluate_moments, m)?)?;
    m.add_function(wrap_pyfunction!(find_focus_moments, m)?)?;
    m.add_function(wrap_pyfunction!(solve_sigma, m)?)?;
    m.add_function(wrap_pyfunction!(measure_batch, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
