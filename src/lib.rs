#![doc = include_str!("../README.md")]

pub mod error;
pub mod linalg_backends;
pub mod matrix;
pub mod pca;
pub mod pipeline;
pub mod standardizer;

pub use error::{PcaError, Result};
pub use pca::{PcaProjector, SvdSolver};
pub use pipeline::StandardizedPca;
pub use standardizer::{Standardizer, StandardizerConfig, VarianceConvention};
