//! Error types shared by the standardizer, the PCA projector and the linear algebra backends.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, PcaError>;

/// Errors raised while fitting or applying a standardizer or a PCA projection.
///
/// Every variant describes a contract violation by the caller or a failed
/// decomposition; none of them are transient.
#[derive(Debug, Error)]
pub enum PcaError {
    /// Input width does not match the width observed during fit
    #[error("input has {found} features but the model was fitted on {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Requested component count lies outside `[1, max]`
    #[error("n_components must lie in [1, {max}], got {requested}")]
    InvalidComponentCount { requested: usize, max: usize },

    /// A column has zero standard deviation and no epsilon floor is configured
    #[error("column {column} has zero standard deviation and no epsilon floor is configured")]
    DegenerateColumn { column: usize },

    /// `transform` (or an accessor that needs fitted state) was called before `fit`
    #[error("model is not fitted; call fit first")]
    NotFitted,

    /// Matrix with zero rows or zero columns
    #[error("input matrix has zero samples or zero features")]
    EmptyInput,

    /// Not enough rows to estimate the requested variance
    #[error("at least {required} samples are required, got {found}")]
    InsufficientSamples { required: usize, found: usize },

    /// NaN or infinite value in the input
    #[error("input matrix contains NaN or infinite values")]
    NonFiniteInput,

    /// Row-of-rows input whose rows differ in length
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Eigen, SVD or QR decomposition failed inside the backend
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// ndarray shape error while assembling a result
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
