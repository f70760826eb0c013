//! Figures (SVG) and terminal charts.

pub mod ascii;
pub mod figures;

pub use ascii::*;
pub use figures::*;
