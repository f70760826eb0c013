//! `fuel-break` library crate.
//!
//! The binary (`fuelbreak`) is a thin wrapper around this library so that:
//!
//! - the statistics are testable without spawning processes
//! - the pipeline can be driven from other tools (notebooks, batch scripts)

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
