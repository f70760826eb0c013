//! Data sources beyond the on-disk table.
//!
//! - `sample`: seeded synthetic datasets with a known intervention effect

pub mod sample;

pub use sample::*;
