//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the aligned input row (`Observation`) and its regime relative to the policy date
//! - model selectors (`Target`, `Transform`, `CovKind`)
//! - data-hygiene descriptors (`Frequency`, `Gap`)
//! - the run configuration (`AnalysisConfig`)

pub mod types;

pub use types::*;
