//! Estimation: intervention regressions and structural-break tests.
//!
//! - `regression`: level-shift / trend-change models per fuel
//! - `breaks`: Chow test at the policy date and the sup-F break-date scan

pub mod breaks;
pub mod regression;

use crate::domain::{AnalysisConfig, CovKind, Transform};
use crate::math::OlsOptions;

/// Estimation settings shared by every model in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub transform: Transform,
    pub cov: CovKind,
    pub hac_lags: Option<usize>,
    pub trim: f64,
}

impl ModelOptions {
    pub fn ols(&self) -> OlsOptions {
        OlsOptions {
            cov: self.cov,
            hac_lags: self.hac_lags,
        }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            transform: Transform::Level,
            cov: CovKind::Nonrobust,
            hac_lags: None,
            trim: crate::domain::DEFAULT_TRIM,
        }
    }
}

impl From<&AnalysisConfig> for ModelOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            transform: config.transform,
            cov: config.cov,
            hac_lags: config.hac_lags,
            trim: config.trim,
        }
    }
}
