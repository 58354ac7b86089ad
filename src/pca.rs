// Principal component analysis (PCA)

use log::{debug, info, trace, warn};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, BackendQR, BackendSVD, FaerLinAlgBackend};
use crate::matrix::{ensure_finite, ensure_non_empty, ensure_width};

/// Threshold for a principal axis norm to be considered non-zero.
const NORMALIZATION_THRESHOLD: f64 = 1e-9;

// Oversampling heuristic for the randomized solver (Halko et al.).
const RANDOMIZED_ADAPTIVE_P_LOWER_BOUND: usize = 5;
const RANDOMIZED_ADAPTIVE_P_UPPER_BOUND: usize = 20;
const RANDOMIZED_MINIMUM_P_FLOOR: usize = 4;

/// Strategy used to extract the leading principal axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvdSolver {
    /// Exact symmetric eigendecomposition of the covariance matrix, or of the
    /// Gram matrix when the data has more features than samples.
    #[default]
    Exact,
    /// Randomized SVD (Halko, Martinsson, Tropp, 2011) with a seeded Gaussian sketch.
    Randomized {
        /// Extra sketch dimensions; `0` selects ~10% of `n_components`, clamped to 5..=20.
        n_oversamples: usize,
        /// Power iterations used to refine the sketch basis.
        n_power_iterations: usize,
        /// Seed for the ChaCha8 sketch generator.
        seed: u64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawFittedComponents")]
struct FittedComponents {
    /// Column means of the training data.
    /// Shape: (n_features)
    mean: Array1<f64>,
    /// Principal axes as unit-length columns, ranked by explained variance.
    /// Shape: (n_features, n_components)
    rotation: Array2<f64>,
    /// Eigenvalues of the covariance matrix for the retained axes.
    /// Shape: (n_components)
    explained_variance: Array1<f64>,
    /// Trace of the covariance matrix, i.e. the sum of all its eigenvalues.
    total_variance: f64,
    n_samples: usize,
}

/// Fitted state as read from a serialized model, checked before use.
#[derive(Deserialize)]
struct RawFittedComponents {
    mean: Array1<f64>,
    rotation: Array2<f64>,
    explained_variance: Array1<f64>,
    total_variance: f64,
    n_samples: usize,
}

impl TryFrom<RawFittedComponents> for FittedComponents {
    type Error = PcaError;

    fn try_from(raw: RawFittedComponents) -> Result<Self> {
        let n_features = raw.mean.len();
        let n_components = raw.rotation.ncols();
        if n_features == 0 || n_components == 0 {
            return Err(PcaError::EmptyInput);
        }
        if raw.rotation.nrows() != n_features {
            return Err(PcaError::DimensionMismatch {
                expected: n_features,
                found: raw.rotation.nrows(),
            });
        }
        if raw.explained_variance.len() != n_components {
            return Err(PcaError::DimensionMismatch {
                expected: n_components,
                found: raw.explained_variance.len(),
            });
        }
        if raw.n_samples < 2 {
            return Err(PcaError::InsufficientSamples {
                required: 2,
                found: raw.n_samples,
            });
        }
        if !raw.total_variance.is_finite() || raw.total_variance < 0.0 {
            return Err(PcaError::InvalidConfiguration(format!(
                "total_variance must be finite and non-negative, got {}",
                raw.total_variance
            )));
        }
        Ok(Self {
            mean: raw.mean,
            rotation: raw.rotation,
            explained_variance: raw.explained_variance,
            total_variance: raw.total_variance,
            n_samples: raw.n_samples,
        })
    }
}

/// Projects data onto its leading principal components.
///
/// `fit` centers the data by its own column means, so callers standardize
/// beforehand when the features have different units (see
/// [`crate::StandardizedPca`]).
///
/// Component signs are fixed so that the entry of largest magnitude in every
/// axis is positive (on exact ties the lowest feature index decides), and axes
/// with equal eigenvalues keep the order returned by the eigensolver. Repeated
/// fits on identical input therefore give identical bases and scores.
///
/// A fitted projector is only read by `transform`, so it can be shared across
/// threads once fitting is done.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use scaled_pca::PcaProjector;
///
/// let data = array![[2.0, 0.0], [0.0, 1.0], [-2.0, 0.0], [0.0, -1.0]];
/// let mut pca = PcaProjector::new();
/// let scores = pca.fit_transform(data.view(), 1).unwrap();
/// assert_eq!(scores.dim(), (4, 1));
/// assert!((scores[[0, 0]] - 2.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PcaProjector {
    solver: SvdSolver,
    fitted: Option<FittedComponents>,
}

impl PcaProjector {
    /// Creates an unfit projector using the exact solver.
    pub fn new() -> Self {
        Self::with_solver(SvdSolver::Exact)
    }

    pub fn with_solver(solver: SvdSolver) -> Self {
        Self { solver, fitted: None }
    }

    pub fn solver(&self) -> SvdSolver {
        self.solver
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Mean vector of the training data, if fitted.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.mean)
    }

    /// Rotation matrix with the principal axes as columns, shape (n_features, n_components).
    pub fn rotation(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.rotation)
    }

    /// Principal axes as rows, shape (n_components, n_features).
    pub fn components(&self) -> Option<ArrayView2<'_, f64>> {
        self.fitted.as_ref().map(|f| f.rotation.t())
    }

    /// Eigenvalues of the covariance matrix for the retained components,
    /// ordered from largest to smallest.
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.explained_variance)
    }

    /// Fraction of the total variance captured by each retained component.
    ///
    /// Each ratio lies in `[0, 1]`, the ratios are non-increasing and sum to at
    /// most 1 (exactly 1, up to rounding, when all components are kept).
    pub fn explained_variance_ratio(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|f| {
            if f.total_variance > 0.0 {
                f.explained_variance
                    .mapv(|v| (v / f.total_variance).clamp(0.0, 1.0))
            } else {
                Array1::zeros(f.explained_variance.len())
            }
        })
    }

    /// Singular values of the centered training matrix for the retained components.
    pub fn singular_values(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|f| {
            let dof = (f.n_samples - 1) as f64;
            f.explained_variance.mapv(|v| (v * dof).sqrt())
        })
    }

    /// Trace of the training covariance matrix.
    pub fn total_variance(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.total_variance)
    }

    pub fn n_components(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.rotation.ncols())
    }

    pub fn n_features(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.mean.len())
    }

    /// Fits the principal axes of `x`.
    ///
    /// * `x` - Input data, shape (n_samples, n_features). Only read.
    /// * `n_components` - Number of axes to keep, in `1..=n_features`.
    ///
    /// On error the projector keeps its previous state.
    ///
    /// # Errors
    /// - [`PcaError::EmptyInput`], [`PcaError::NonFiniteInput`] for unusable input.
    /// - [`PcaError::InsufficientSamples`] for fewer than 2 rows.
    /// - [`PcaError::InvalidComponentCount`] if `n_components` is 0 or above `n_features`.
    /// - [`PcaError::Decomposition`] if the eigen/SVD/QR backend fails.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>, n_components: usize) -> Result<()> {
        ensure_non_empty(&x)?;
        let (n_samples, n_features) = x.dim();
        if n_components == 0 || n_components > n_features {
            return Err(PcaError::InvalidComponentCount {
                requested: n_components,
                max: n_features,
            });
        }
        if n_samples < 2 {
            return Err(PcaError::InsufficientSamples {
                required: 2,
                found: n_samples,
            });
        }
        ensure_finite(&x)?;

        info!(
            "Fitting PCA: {} samples x {} features, {} components, solver {:?}.",
            n_samples, n_features, n_components, self.solver
        );

        let mean = x.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;
        let centered = &x - &mean;
        let total_variance = centered.iter().map(|v| v * v).sum::<f64>() / (n_samples - 1) as f64;

        let backend = FaerLinAlgBackend;
        let (mut rotation, explained_variance) = match self.solver {
            SvdSolver::Exact => exact_components(&backend, &centered, n_components)?,
            SvdSolver::Randomized {
                n_oversamples,
                n_power_iterations,
                seed,
            } => {
                if n_components > n_samples.min(n_features) {
                    warn!(
                        "Randomized solver cannot extract {} components from a {}x{} matrix; using the exact solver.",
                        n_components, n_samples, n_features
                    );
                    exact_components(&backend, &centered, n_components)?
                } else {
                    randomized_components(
                        &backend,
                        &centered,
                        n_components,
                        n_oversamples,
                        n_power_iterations,
                        seed,
                    )?
                }
            }
        };
        enforce_sign_convention(&mut rotation);

        debug!(
            "PCA fitted; leading eigenvalues {:?} of total variance {:.6}.",
            explained_variance.slice(s![..explained_variance.len().min(5)]),
            total_variance
        );
        self.fitted = Some(FittedComponents {
            mean,
            rotation,
            explained_variance,
            total_variance,
            n_samples,
        });
        Ok(())
    }

    fn fitted_components(&self) -> Result<&FittedComponents> {
        self.fitted.as_ref().ok_or(PcaError::NotFitted)
    }

    /// Projects `x` onto the fitted axes: `(x - mean) · rotation`.
    ///
    /// # Errors
    /// [`PcaError::NotFitted`] before fit, [`PcaError::DimensionMismatch`] when
    /// `x` does not have the fitted number of features.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted_components()?;
        ensure_width(&x, fitted.mean.len())?;

        if x.nrows() == 0 {
            return Ok(Array2::zeros((0, fitted.rotation.ncols())));
        }
        let centered = &x - &fitted.mean;
        Ok(centered.dot(&fitted.rotation))
    }

    /// Fits on `x` and returns its principal component scores.
    pub fn fit_transform(&mut self, x: ArrayView2<'_, f64>, n_components: usize) -> Result<Array2<f64>> {
        self.fit(x, n_components)?;
        self.transform(x)
    }

    /// Maps scores back to feature space: `scores · rotationᵀ + mean`.
    ///
    /// With all components kept this recovers the training data up to rounding.
    pub fn inverse_transform(&self, scores: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted_components()?;
        ensure_width(&scores, fitted.rotation.ncols())?;

        let mut reconstructed = scores.dot(&fitted.rotation.t());
        reconstructed += &fitted.mean;
        Ok(reconstructed)
    }
}

/// Indices of `values` sorted by descending value. The sort is stable, so
/// equal values keep their original relative order.
fn descending_order(values: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Scales every column of `axes` to unit length. Returns `false` if a column
/// is numerically zero.
fn normalize_columns(axes: &mut Array2<f64>) -> bool {
    let mut all_nonzero = true;
    for mut column in axes.columns_mut() {
        let norm = column.dot(&column).sqrt();
        if norm > NORMALIZATION_THRESHOLD {
            column.mapv_inplace(|v| v / norm);
        } else {
            column.fill(0.0);
            all_nonzero = false;
        }
    }
    all_nonzero
}

/// Flips each axis so that its entry of largest magnitude is positive.
pub(crate) fn enforce_sign_convention(rotation: &mut Array2<f64>) {
    for mut axis in rotation.columns_mut() {
        let mut pivot = 0;
        let mut largest = 0.0;
        for (i, v) in axis.iter().enumerate() {
            if v.abs() > largest {
                largest = v.abs();
                pivot = i;
            }
        }
        if axis[pivot] < 0.0 {
            axis.mapv_inplace(|v| -v);
        }
    }
}

/// Exact principal axes of a centered matrix.
///
/// Uses the (n_features x n_features) covariance matrix unless the matrix is
/// wide and fewer than `n_samples` components are requested, in which case the
/// (n_samples x n_samples) Gram matrix is decomposed and its eigenvectors are
/// mapped back to feature space.
pub(crate) fn exact_components<B: BackendEigh>(
    backend: &B,
    centered: &Array2<f64>,
    n_components: usize,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let (n_samples, n_features) = centered.dim();
    if n_features > n_samples && n_components < n_samples {
        if let Some(result) = gram_components(backend, centered, n_components)? {
            return Ok(result);
        }
        debug!("Gram matrix yielded a null axis; falling back to the covariance matrix.");
    }
    covariance_components(backend, centered, n_components)
}

pub(crate) fn covariance_components<B: BackendEigh>(
    backend: &B,
    centered: &Array2<f64>,
    n_components: usize,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let (n_samples, n_features) = centered.dim();
    trace!("Decomposing {}x{} covariance matrix.", n_features, n_features);

    let mut cov_matrix = centered.t().dot(centered);
    cov_matrix /= (n_samples - 1) as f64;

    let eig = backend.eigh_lower(&cov_matrix)?;
    let order = descending_order(&eig.eigenvalues);

    let mut rotation = Array2::<f64>::zeros((n_features, n_components));
    let mut variances = Array1::<f64>::zeros(n_components);
    for (slot, &idx) in order.iter().take(n_components).enumerate() {
        rotation.column_mut(slot).assign(&eig.eigenvectors.column(idx));
        variances[slot] = eig.eigenvalues[idx].max(0.0);
    }
    normalize_columns(&mut rotation);
    Ok((rotation, variances))
}

/// Gram-trick axes: `v_k = Xᵀ u_k / ||Xᵀ u_k||`. Returns `None` when one of
/// the requested axes is numerically zero (rank-deficient data).
pub(crate) fn gram_components<B: BackendEigh>(
    backend: &B,
    centered: &Array2<f64>,
    n_components: usize,
) -> Result<Option<(Array2<f64>, Array1<f64>)>> {
    let (n_samples, n_features) = centered.dim();
    trace!("Decomposing {}x{} Gram matrix.", n_samples, n_samples);

    let mut gram_matrix = centered.dot(&centered.t());
    gram_matrix /= (n_samples - 1) as f64;

    let eig = backend.eigh_lower(&gram_matrix)?;
    let order = descending_order(&eig.eigenvalues);

    let mut rotation = Array2::<f64>::zeros((n_features, n_components));
    let mut variances = Array1::<f64>::zeros(n_components);
    for (slot, &idx) in order.iter().take(n_components).enumerate() {
        let axis = centered.t().dot(&eig.eigenvectors.column(idx));
        rotation.column_mut(slot).assign(&axis);
        variances[slot] = eig.eigenvalues[idx].max(0.0);
    }
    if !normalize_columns(&mut rotation) {
        return Ok(None);
    }
    Ok(Some((rotation, variances)))
}

/// Approximate principal axes via randomized SVD.
///
/// For a tall matrix `A` (n_features <= n_samples) the sketch is `Y = A Ω`
/// and the axes come from `Vᵀ` of the SVD of `Qᵀ A`. For a wide matrix the
/// sketch is taken of `Aᵀ` and the axes are `Q U`. Power iterations
/// re-orthonormalize with QR after every multiplication.
pub(crate) fn randomized_components<B>(
    backend: &B,
    centered: &Array2<f64>,
    n_components: usize,
    n_oversamples: usize,
    n_power_iterations: usize,
    seed: u64,
) -> Result<(Array2<f64>, Array1<f64>)>
where
    B: BackendQR + BackendSVD,
{
    let (n_samples, n_features) = centered.dim();
    let max_rank = n_samples.min(n_features);

    let p = if n_oversamples == 0 {
        ((n_components as f64 * 0.1).ceil() as usize)
            .clamp(RANDOMIZED_ADAPTIVE_P_LOWER_BOUND, RANDOMIZED_ADAPTIVE_P_UPPER_BOUND)
    } else {
        n_oversamples.max(RANDOMIZED_MINIMUM_P_FLOOR)
    };
    let sketch_width = (n_components + p).min(max_rank).max(n_components);
    debug!(
        "Randomized SVD: sketch width {} (oversampling {}), {} power iterations, seed {}.",
        sketch_width, p, n_power_iterations, seed
    );

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| PcaError::Decomposition(format!("gaussian sketch: {}", e)))?;

    let (axes_sketch, singular_values) = if n_features <= n_samples {
        let omega = Array2::from_shape_fn((n_features, sketch_width), |_| rng.sample(normal));
        let mut q_basis = backend.qr_q_factor(&centered.dot(&omega))?;
        for _ in 0..n_power_iterations {
            let w_basis = backend.qr_q_factor(&centered.t().dot(&q_basis))?;
            q_basis = backend.qr_q_factor(&centered.dot(&w_basis))?;
        }
        let projected = q_basis.t().dot(centered);
        let svd = backend.svd_thin(&projected, false, true)?;
        let vt = svd
            .vt
            .ok_or_else(|| PcaError::Decomposition("SVD of the projected sketch returned no Vᵀ".into()))?;
        (vt.reversed_axes(), svd.s)
    } else {
        let omega = Array2::from_shape_fn((n_samples, sketch_width), |_| rng.sample(normal));
        let mut q_basis = backend.qr_q_factor(&centered.t().dot(&omega))?;
        for _ in 0..n_power_iterations {
            let w_basis = backend.qr_q_factor(&centered.dot(&q_basis))?;
            q_basis = backend.qr_q_factor(&centered.t().dot(&w_basis))?;
        }
        let projected = centered.dot(&q_basis).reversed_axes();
        let svd = backend.svd_thin(&projected, true, false)?;
        let u = svd
            .u
            .ok_or_else(|| PcaError::Decomposition("SVD of the projected sketch returned no U".into()))?;
        (q_basis.dot(&u), svd.s)
    };

    if axes_sketch.ncols() < n_components {
        return Err(PcaError::Decomposition(format!(
            "randomized sketch produced {} axes, {} requested",
            axes_sketch.ncols(),
            n_components
        )));
    }

    let mut rotation = axes_sketch.slice(s![.., ..n_components]).to_owned();
    normalize_columns(&mut rotation);
    let dof = (n_samples - 1) as f64;
    let variances = singular_values
        .slice(s![..n_components])
        .mapv(|sv| sv * sv / dof);
    Ok((rotation, variances))
}
