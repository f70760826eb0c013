//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - table, dataset, and report exports (`export`)
//! - results JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
