//! Statistics: least squares, the augmented Dickey-Fuller regression,
//! MacKinnon p-values, and the Engle-Granger cointegration test.

pub mod adf;
pub mod coint;
pub mod mackinnon;
pub mod ols;

pub use adf::{adf_no_constant, AdfResult};
pub use coint::{CointResult, EngleGranger};
pub use mackinnon::{mackinnon_p_value, TrendSpec};
pub use ols::{ols, OlsFit};

use thiserror::Error;

/// Why a statistical test could not run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    #[error("series lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("insufficient observations: need at least {needed}, got {got}")]
    InsufficientObservations { needed: usize, got: usize },

    #[error("non-finite input at index {index}")]
    NonFinite { index: usize },
}

/// Two equal-length series → p-value for H0 "no cointegration".
///
/// Implementations are shared across the worker pool, so they must be
/// stateless or internally synchronized.
pub trait CointegrationTest: Send + Sync {
    fn name(&self) -> &str;

    fn p_value(&self, y: &[f64], x: &[f64]) -> Result<f64, StatError>;
}

impl<T: CointegrationTest + ?Sized> CointegrationTest for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn p_value(&self, y: &[f64], x: &[f64]) -> Result<f64, StatError> {
        (**self).p_value(y, x)
    }
}

impl<T: CointegrationTest + ?Sized> CointegrationTest for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn p_value(&self, y: &[f64], x: &[f64]) -> Result<f64, StatError> {
        (**self).p_value(y, x)
    }
}
