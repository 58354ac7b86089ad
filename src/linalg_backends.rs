// src/linalg_backends.rs

use ndarray::{Array1, Array2};

use crate::error::{PcaError, Result};

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues in ascending order.
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<f64>,
}

/// Output of a thin Singular Value Decomposition.
#[derive(Debug)]
pub struct SVDOutput {
    pub u: Option<Array2<f64>>,
    /// Singular values, non-negative and non-increasing.
    pub s: Array1<f64>,
    pub vt: Option<Array2<f64>>,
}

/// Symmetric eigendecomposition. Implementers read the lower triangle only.
pub trait BackendEigh {
    fn eigh_lower(&self, matrix: &Array2<f64>) -> Result<EighOutput>;
}

/// QR decomposition, reduced to the thin Q factor.
pub trait BackendQR {
    fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Thin Singular Value Decomposition.
pub trait BackendSVD {
    fn svd_thin(&self, matrix: &Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput>;
}

/// Pure-Rust backend built on faer. Runs sequentially: faer is compiled without rayon.
#[derive(Debug, Default, Copy, Clone)]
pub struct FaerLinAlgBackend;

fn ndarray_to_faer(matrix: &Array2<f64>) -> faer::Mat<f64> {
    faer::Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

fn faer_mat_to_ndarray(faer_mat: faer::MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((faer_mat.nrows(), faer_mat.ncols()), |(i, j)| faer_mat[(i, j)])
}

fn faer_col_to_ndarray_vec(faer_col: faer::ColRef<'_, f64>) -> Array1<f64> {
    Array1::from_shape_fn(faer_col.nrows(), |i| faer_col[i])
}

impl BackendEigh for FaerLinAlgBackend {
    fn eigh_lower(&self, matrix: &Array2<f64>) -> Result<EighOutput> {
        if matrix.nrows() != matrix.ncols() {
            return Err(PcaError::Decomposition(format!(
                "eigendecomposition needs a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if matrix.is_empty() {
            return Ok(EighOutput {
                eigenvalues: Array1::zeros(0),
                eigenvectors: Array2::zeros((0, 0)),
            });
        }
        let eig = ndarray_to_faer(matrix)
            .self_adjoint_eigen(faer::Side::Lower)
            .map_err(|e| PcaError::Decomposition(format!("symmetric eigendecomposition: {:?}", e)))?;
        Ok(EighOutput {
            eigenvalues: faer_col_to_ndarray_vec(eig.S().column_vector()),
            eigenvectors: faer_mat_to_ndarray(eig.U()),
        })
    }
}

impl BackendQR for FaerLinAlgBackend {
    fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        let (nrows, ncols) = matrix.dim();
        if nrows == 0 || ncols == 0 {
            return Ok(Array2::zeros((nrows, nrows.min(ncols))));
        }
        let q_thin = ndarray_to_faer(matrix).qr().compute_thin_Q();
        Ok(faer_mat_to_ndarray(q_thin.as_ref()))
    }
}

impl BackendSVD for FaerLinAlgBackend {
    fn svd_thin(&self, matrix: &Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
        let (nrows, ncols) = matrix.dim();
        if matrix.is_empty() {
            let k_dim = nrows.min(ncols);
            return Ok(SVDOutput {
                u: compute_u.then(|| Array2::zeros((nrows, k_dim))),
                s: Array1::zeros(k_dim),
                vt: compute_v.then(|| Array2::zeros((k_dim, ncols))),
            });
        }
        let svd = ndarray_to_faer(matrix)
            .thin_svd()
            .map_err(|e| PcaError::Decomposition(format!("thin SVD: {:?}", e)))?;

        let s = faer_col_to_ndarray_vec(svd.S().column_vector());
        let u = compute_u.then(|| faer_mat_to_ndarray(svd.U()));
        let vt = compute_v.then(|| faer_mat_to_ndarray(svd.V()).reversed_axes());

        Ok(SVDOutput { u, s, vt })
    }
}
