//! Standardize-then-project pipeline.

use log::info;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pca::{PcaProjector, SvdSolver};
use crate::standardizer::{Standardizer, StandardizerConfig};

/// A [`Standardizer`] followed by a [`PcaProjector`] fitted on its output.
///
/// This is the usual way to run PCA on features measured in different units:
/// every column is rescaled to unit variance before the axes are extracted, so
/// no feature dominates because of its scale.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use scaled_pca::StandardizedPca;
///
/// let data = array![[1.0, 100.0], [2.0, 210.0], [3.0, 290.0], [4.0, 400.0]];
/// let mut model = StandardizedPca::new();
/// let scores = model.fit_transform(data.view(), 1).unwrap();
/// assert_eq!(scores.dim(), (4, 1));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StandardizedPca {
    standardizer: Standardizer,
    projector: PcaProjector,
}

impl StandardizedPca {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StandardizerConfig, solver: SvdSolver) -> Self {
        Self {
            standardizer: Standardizer::with_config(config),
            projector: PcaProjector::with_solver(solver),
        }
    }

    pub fn standardizer(&self) -> &Standardizer {
        &self.standardizer
    }

    pub fn projector(&self) -> &PcaProjector {
        &self.projector
    }

    pub fn is_fitted(&self) -> bool {
        self.standardizer.is_fitted() && self.projector.is_fitted()
    }

    /// Fits the standardizer on `x`, then the projector on the standardized data.
    ///
    /// Both stages are fitted on fresh copies and swapped in together, so a
    /// failure in either one leaves the pipeline exactly as it was.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>, n_components: usize) -> Result<()> {
        self.fit_stages(x, n_components).map(|_| ())
    }

    fn fit_stages(&mut self, x: ArrayView2<'_, f64>, n_components: usize) -> Result<Array2<f64>> {
        let mut standardizer = Standardizer::with_config(self.standardizer.config().clone());
        let standardized = standardizer.fit_transform(x)?;

        let mut projector = PcaProjector::with_solver(self.projector.solver());
        projector.fit(standardized.view(), n_components)?;

        info!(
            "Standardized PCA fitted on {} samples, keeping {} of {} components.",
            x.nrows(),
            n_components,
            x.ncols()
        );
        self.standardizer = standardizer;
        self.projector = projector;
        Ok(standardized)
    }

    /// Standardizes `x` with the fitted statistics and projects it.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let standardized = self.standardizer.transform(x)?;
        self.projector.transform(standardized.view())
    }

    pub fn fit_transform(&mut self, x: ArrayView2<'_, f64>, n_components: usize) -> Result<Array2<f64>> {
        let standardized = self.fit_stages(x, n_components)?;
        self.projector.transform(standardized.view())
    }

    /// Maps scores back to the original feature units.
    pub fn inverse_transform(&self, scores: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let standardized = self.projector.inverse_transform(scores)?;
        self.standardizer.inverse_transform(standardized.view())
    }
}
