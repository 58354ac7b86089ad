//! Conversions and input checks shared by the standardizer and the projector.

use ndarray::{Array2, ArrayView2};

use crate::error::{PcaError, Result};

/// Builds a dense `(n_rows, n_features)` matrix from row-of-rows input.
///
/// Every row must have the length of the first row; row order is preserved.
///
/// # Examples
///
/// ```
/// use scaled_pca::matrix::from_rows;
///
/// let m = from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
/// assert_eq!(m.dim(), (2, 2));
/// ```
pub fn from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_features = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != n_features {
            return Err(PcaError::RaggedRows {
                row: row_idx,
                expected: n_features,
                found: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Ok(Array2::from_shape_vec((rows.len(), n_features), flat)?)
}

pub(crate) fn ensure_non_empty(x: &ArrayView2<'_, f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(PcaError::EmptyInput);
    }
    Ok(())
}

pub(crate) fn ensure_finite(x: &ArrayView2<'_, f64>) -> Result<()> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PcaError::NonFiniteInput);
    }
    Ok(())
}

pub(crate) fn ensure_width(x: &ArrayView2<'_, f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(PcaError::DimensionMismatch {
            expected,
            found: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn from_rows_preserves_row_order() {
        let m = from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            PcaError::RaggedRows { row: 1, expected: 2, found: 1 }
        ));
    }

    #[test]
    fn from_rows_of_nothing_is_empty() {
        let m = from_rows(&[]).unwrap();
        assert_eq!(m.dim(), (0, 0));
        assert!(matches!(ensure_non_empty(&m.view()), Err(PcaError::EmptyInput)));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let m = array![[1.0, f64::NAN]];
        assert!(matches!(ensure_finite(&m.view()), Err(PcaError::NonFiniteInput)));
    }
}
