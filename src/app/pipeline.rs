//! Shared analysis pipeline used by the `analyze` and `describe` commands.
//!
//! ingest -> derive -> fit (gasoline, diesel) -> break tests -> tables
//!
//! The commands then focus on presentation (printing) and `write_outputs`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{AnalysisConfig, Target};
use crate::error::AppError;
use crate::fit::ModelOptions;
use crate::fit::breaks::{BreakTests, run_break_tests};
use crate::fit::regression::{InterventionFit, fit_all};
use crate::io::export::{ensure_dir, write_derived_csv, write_table_csv, write_text};
use crate::io::ingest::{IngestOptions, IngestedData, load_observations};
use crate::io::results::{ResultsFile, write_results_json};
use crate::models::{DerivedData, derive};
use crate::report::markdown::render_markdown;
use crate::report::tables::{Table, all_tables, descriptive_tables};

/// All computed outputs of a single `fuelbreak analyze` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub derived: DerivedData,
    pub fits: Vec<InterventionFit>,
    pub breaks: Vec<BreakTests>,
    pub tables: Vec<Table>,
}

/// Load the price table named in the config and run the full analysis.
pub fn run_analysis(config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let ingest = load_observations(
        &config.data_path,
        IngestOptions {
            strict_gaps: config.strict_gaps,
        },
    )?;
    run_analysis_with_data(config, ingest)
}

/// Run the analysis on already-ingested observations.
pub fn run_analysis_with_data(config: &AnalysisConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let derived = derive(&ingest.observations, config.policy_date);
    let opts = ModelOptions::from(config);

    let fits = fit_all(&derived, &opts)?;
    let breaks = Target::ALL
        .iter()
        .map(|&target| run_break_tests(&derived, target, &opts))
        .collect::<Result<Vec<_>, _>>()?;
    let tables = all_tables(&derived, &fits, &breaks);

    Ok(RunOutput {
        ingest,
        derived,
        fits,
        breaks,
        tables,
    })
}

/// Descriptive pass only (tables 1–3).
pub fn run_describe(
    data_path: &Path,
    policy_date: NaiveDate,
    options: IngestOptions,
) -> Result<(IngestedData, DerivedData, Vec<Table>), AppError> {
    let ingest = load_observations(data_path, options)?;
    let derived = derive(&ingest.observations, policy_date);
    let tables = descriptive_tables(&derived);
    Ok((ingest, derived, tables))
}

/// Write every artifact of a run into `config.out_dir`; returns the written paths.
pub fn write_outputs(config: &AnalysisConfig, run: &RunOutput) -> Result<Vec<PathBuf>, AppError> {
    let dir = config.out_dir.as_path();
    ensure_dir(dir)?;
    let mut written = Vec::new();

    for table in &run.tables {
        written.push(write_table_csv(dir, table)?);
    }

    let report = dir.join("report.md");
    write_text(
        &report,
        &render_markdown(&run.ingest, &run.derived, config, &run.tables, &run.fits, &run.breaks),
    )?;
    written.push(report);

    let derived = dir.join("derived.csv");
    write_derived_csv(&derived, &run.derived)?;
    written.push(derived);

    let results = dir.join("results.json");
    write_results_json(
        &results,
        &ResultsFile::new(config, &run.ingest, &run.fits, &run.breaks, &run.tables),
    )?;
    written.push(results);

    if config.figures {
        for figure in crate::plot::figures::render_all(&run.derived)? {
            let path = dir.join(&figure.file_name);
            write_text(&path, &figure.svg)?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), files = written.len(), "wrote outputs");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, generate_sample};
    use crate::io::export::observations_to_csv;
    use crate::io::ingest::load_observations_from_reader;
    use crate::io::results::read_results_json;

    fn synthetic_ingest() -> IngestedData {
        let csv = observations_to_csv(&generate_sample(&SampleConfig::default()).unwrap()).unwrap();
        load_observations_from_reader(csv.as_bytes(), "synthetic", IngestOptions::default()).unwrap()
    }

    #[test]
    fn analysis_produces_six_tables_and_both_break_tests() {
        let config = AnalysisConfig::with_data("synthetic");
        let run = run_analysis_with_data(&config, synthetic_ingest()).unwrap();

        let keys: Vec<&str> = run.tables.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "table1_descriptive",
                "table2_corr_pre",
                "table3_corr_post",
                "table4_gasoline",
                "table5_diesel",
                "table6_breaks"
            ]
        );
        assert_eq!(run.breaks.len(), 2);
        assert!(run.breaks.iter().all(|b| b.chow.is_some() && b.scan.is_some()));
    }

    #[test]
    fn write_outputs_creates_every_artifact() {
        let dir = std::env::temp_dir().join(format!("fuelbreak-pipeline-{}", std::process::id()));
        let mut config = AnalysisConfig::with_data("synthetic");
        config.out_dir = dir.clone();

        let run = run_analysis_with_data(&config, synthetic_ingest()).unwrap();
        let written = write_outputs(&config, &run).unwrap();
        assert_eq!(written.len(), 6 + 3 + 4);

        for name in ["table6_breaks.csv", "report.md", "derived.csv", "figure1_levels.svg"] {
            assert!(dir.join(name).is_file(), "missing {name}");
        }
        let derived = std::fs::read_to_string(dir.join("derived.csv")).unwrap();
        assert_eq!(derived.lines().count(), 73);

        let results = read_results_json(&dir.join("results.json")).unwrap();
        assert_eq!(results.tables.len(), 6);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_data_file_is_an_input_error() {
        let config = AnalysisConfig::with_data("/nonexistent/fuel-prices.csv");
        let err = run_analysis(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
