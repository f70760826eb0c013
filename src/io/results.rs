//! Read/write the results JSON.
//!
//! The results file is the portable record of one analysis run:
//! - configuration (policy date, transform, covariance, trim)
//! - sample metadata (source, span, counts)
//! - per-target intervention fits and break tests
//! - the rendered tables, so `show` can re-print them without the data

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::AnalysisConfig;
use crate::error::AppError;
use crate::fit::breaks::BreakTests;
use crate::fit::regression::InterventionFit;
use crate::io::ingest::IngestedData;
use crate::report::tables::Table;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleInfo {
    pub source: String,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub rows_read: usize,
    pub rows_used: usize,
    pub rows_skipped: usize,
    #[serde(default)]
    pub missing_values: usize,
    pub gaps: usize,
}

impl SampleInfo {
    pub fn from_ingest(ingest: &IngestedData) -> Self {
        Self {
            source: ingest.source.clone(),
            first_date: ingest.first_date(),
            last_date: ingest.last_date(),
            rows_read: ingest.rows_read,
            rows_used: ingest.rows_used,
            rows_skipped: ingest.row_errors.len(),
            missing_values: ingest.missing_values.len(),
            gaps: ingest.gaps.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub config: AnalysisConfig,
    pub sample: SampleInfo,
    pub fits: Vec<InterventionFit>,
    pub breaks: Vec<BreakTests>,
    pub tables: Vec<Table>,
}

impl ResultsFile {
    pub fn new(
        config: &AnalysisConfig,
        ingest: &IngestedData,
        fits: &[InterventionFit],
        breaks: &[BreakTests],
        tables: &[Table],
    ) -> Self {
        Self {
            tool: "fuelbreak".to_string(),
            config: config.clone(),
            sample: SampleInfo::from_ingest(ingest),
            fits: fits.to_vec(),
            breaks: breaks.to_vec(),
            tables: tables.to_vec(),
        }
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, results)
        .map_err(|e| AppError::input(format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid results JSON: {e}")))?;
    if results.tool != "fuelbreak" {
        return Err(AppError::input(format!(
            "'{}' was not written by fuelbreak (tool = '{}').",
            path.display(),
            results.tool
        )));
    }
    Ok(results)
}
