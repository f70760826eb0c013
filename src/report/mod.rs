//! Reporting: thesis tables, terminal output, and the Markdown report.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

pub mod format;
pub mod markdown;
pub mod tables;

pub use format::*;
pub use markdown::*;
pub use tables::*;
