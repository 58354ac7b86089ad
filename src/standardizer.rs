//! Column-wise standardization (z-scores).

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};
use crate::matrix::{ensure_finite, ensure_non_empty, ensure_width};

/// Denominator used for the per-column variance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarianceConvention {
    /// Divide by `n` (ddof = 0).
    #[default]
    Population,
    /// Divide by `n - 1` (ddof = 1).
    Sample,
}

impl VarianceConvention {
    /// Delta degrees of freedom passed to the variance estimate.
    pub fn ddof(self) -> f64 {
        match self {
            VarianceConvention::Population => 0.0,
            VarianceConvention::Sample => 1.0,
        }
    }

    fn min_samples(self) -> usize {
        match self {
            VarianceConvention::Population => 1,
            VarianceConvention::Sample => 2,
        }
    }
}

/// Configuration for [`Standardizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardizerConfig {
    /// Population or sample standard deviation.
    pub variance: VarianceConvention,
    /// Lower bound applied to every standard deviation. When `None`, a column
    /// with zero standard deviation fails the fit with
    /// [`PcaError::DegenerateColumn`]. When `Some(eps)`, standard deviations
    /// below `eps` are raised to `eps`, so a constant column maps to zeros.
    pub epsilon_floor: Option<f64>,
    /// Subtract the column mean.
    pub with_mean: bool,
    /// Divide by the column standard deviation.
    pub with_std: bool,
}

impl Default for StandardizerConfig {
    fn default() -> Self {
        Self {
            variance: VarianceConvention::Population,
            epsilon_floor: None,
            with_mean: true,
            with_std: true,
        }
    }
}

impl StandardizerConfig {
    fn validate(&self) -> Result<()> {
        if let Some(eps) = self.epsilon_floor {
            if !eps.is_finite() || eps <= 0.0 {
                return Err(PcaError::InvalidConfiguration(format!(
                    "epsilon_floor must be positive and finite, got {}",
                    eps
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawColumnStatistics")]
struct ColumnStatistics {
    /// Shape: (n_features). Zeros when `with_mean` is off.
    mean: Array1<f64>,
    /// Shape: (n_features). Strictly positive; ones when `with_std` is off.
    std: Array1<f64>,
    n_samples_seen: usize,
}

#[derive(Deserialize)]
struct RawColumnStatistics {
    mean: Array1<f64>,
    std: Array1<f64>,
    n_samples_seen: usize,
}

impl TryFrom<RawColumnStatistics> for ColumnStatistics {
    type Error = PcaError;

    fn try_from(raw: RawColumnStatistics) -> Result<Self> {
        if raw.mean.is_empty() || raw.n_samples_seen == 0 {
            return Err(PcaError::EmptyInput);
        }
        if raw.std.len() != raw.mean.len() {
            return Err(PcaError::DimensionMismatch {
                expected: raw.mean.len(),
                found: raw.std.len(),
            });
        }
        if let Some(column) = raw.std.iter().position(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(PcaError::DegenerateColumn { column });
        }
        Ok(Self {
            mean: raw.mean,
            std: raw.std,
            n_samples_seen: raw.n_samples_seen,
        })
    }
}

/// Rescales every column to zero mean and unit variance.
///
/// The standardizer is unfit until [`Standardizer::fit`] succeeds; a failed fit
/// leaves any previously fitted statistics in place.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use scaled_pca::Standardizer;
///
/// let data = array![[1.0, 10.0], [3.0, 30.0]];
/// let mut scaler = Standardizer::new();
/// let z = scaler.fit_transform(data.view()).unwrap();
/// assert_eq!(z, array![[-1.0, -1.0], [1.0, 1.0]]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Standardizer {
    config: StandardizerConfig,
    fitted: Option<ColumnStatistics>,
}

impl Standardizer {
    /// Creates an unfit standardizer with the default configuration
    /// (population standard deviation, no epsilon floor).
    pub fn new() -> Self {
        Self::with_config(StandardizerConfig::default())
    }

    pub fn with_config(config: StandardizerConfig) -> Self {
        Self { config, fitted: None }
    }

    pub fn config(&self) -> &StandardizerConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Per-column means observed during fit, if fitted.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|s| &s.mean)
    }

    /// Per-column standard deviations (after any epsilon floor), if fitted.
    pub fn std(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|s| &s.std)
    }

    /// Number of columns seen during fit, if fitted.
    pub fn n_features(&self) -> Option<usize> {
        self.fitted.as_ref().map(|s| s.mean.len())
    }

    /// Number of rows seen during fit, if fitted.
    pub fn n_samples_seen(&self) -> Option<usize> {
        self.fitted.as_ref().map(|s| s.n_samples_seen)
    }

    /// Computes per-column mean and standard deviation of `x`.
    ///
    /// `x` is only read. On error the previous fitted state is kept.
    ///
    /// # Errors
    /// - [`PcaError::EmptyInput`] for a matrix with zero rows or columns.
    /// - [`PcaError::InsufficientSamples`] for a single row under the sample convention.
    /// - [`PcaError::NonFiniteInput`] if `x` holds NaN or infinities.
    /// - [`PcaError::DegenerateColumn`] for a zero-variance column without an epsilon floor.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()> {
        self.config.validate()?;
        ensure_non_empty(&x)?;
        ensure_finite(&x)?;

        let (n_samples, n_features) = x.dim();
        let required = if self.config.with_std {
            self.config.variance.min_samples()
        } else {
            1
        };
        if n_samples < required {
            return Err(PcaError::InsufficientSamples {
                required,
                found: n_samples,
            });
        }

        let column_means = x.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;

        let std = if self.config.with_std {
            let raw_std = x.std_axis(Axis(0), self.config.variance.ddof());
            self.sanitize_std(&x, raw_std)?
        } else {
            Array1::ones(n_features)
        };

        let mean = if self.config.with_mean {
            column_means
        } else {
            Array1::zeros(n_features)
        };

        debug!(
            "Fitted standardizer on {} samples x {} features ({:?} variance).",
            n_samples, n_features, self.config.variance
        );
        self.fitted = Some(ColumnStatistics {
            mean,
            std,
            n_samples_seen: n_samples,
        });
        Ok(())
    }

    fn sanitize_std(&self, x: &ArrayView2<'_, f64>, raw_std: Array1<f64>) -> Result<Array1<f64>> {
        match self.config.epsilon_floor {
            None => {
                // a constant column can leave a rounding residue in its std
                let degenerate = raw_std.iter().zip(x.columns()).position(|(&s, column)| {
                    s == 0.0 || column.iter().all(|&v| v == column[0])
                });
                match degenerate {
                    Some(column) => Err(PcaError::DegenerateColumn { column }),
                    None => Ok(raw_std),
                }
            }
            Some(eps) => {
                let floored = raw_std.iter().filter(|&&s| s < eps).count();
                if floored > 0 {
                    warn!(
                        "{} column(s) have a standard deviation below {:e}; using the floor instead.",
                        floored, eps
                    );
                }
                Ok(raw_std.mapv(|s| s.max(eps)))
            }
        }
    }

    fn statistics(&self) -> Result<&ColumnStatistics> {
        self.fitted.as_ref().ok_or(PcaError::NotFitted)
    }

    /// Returns `(x - mean) / std` column-wise as a new matrix.
    ///
    /// # Errors
    /// [`PcaError::NotFitted`] before fit, [`PcaError::DimensionMismatch`] if
    /// `x` does not have the fitted number of columns.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let stats = self.statistics()?;
        ensure_width(&x, stats.mean.len())?;

        let mut z = x.to_owned();
        z -= &stats.mean;
        z /= &stats.std;
        Ok(z)
    }

    /// Fits on `x` and returns the standardized `x`.
    pub fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Maps standardized values back to the original units: `z * std + mean`.
    pub fn inverse_transform(&self, z: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let stats = self.statistics()?;
        ensure_width(&z, stats.mean.len())?;

        let mut x = z.to_owned();
        x *= &stats.std;
        x += &stats.mean;
        Ok(x)
    }
}
