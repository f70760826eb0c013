//! Mathematical utilities: least squares with inference and descriptive statistics.

pub mod nullable;
pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
