//! Export tables, the derived dataset, and observation tables to disk.
//!
//! The CSVs are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::Observation;
use crate::error::AppError;
use crate::models::DerivedData;
use crate::report::tables::Table;

/// Create the output directory if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::input(format!("Failed to create output dir '{}': {e}", dir.display())))
}

/// Write one table as CSV (`<dir>/<key>.csv`), values rendered with table rounding.
pub fn write_table_csv(dir: &Path, table: &Table) -> Result<PathBuf, AppError> {
    let path = dir.join(format!("{}.csv", table.key));
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| AppError::input(format!("Failed to create table CSV '{}': {e}", path.display())))?;

    for line in table.rendered_grid() {
        writer
            .write_record(&line)
            .map_err(|e| AppError::input(format!("Failed to write table CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush table CSV: {e}")))?;

    Ok(path)
}

/// Write the derived dataset (inputs plus constructed variables).
pub fn write_derived_csv(path: &Path, data: &DerivedData) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create derived CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "date,time,post,time_post,preco_diesel,preco_gasolina,preco_brent,preco_dolar,brent_brl"
    )
    .map_err(|e| AppError::input(format!("Failed to write derived CSV header: {e}")))?;

    for r in &data.rows {
        let brent_brl = if r.brent_brl.is_finite() { format!("{:.6}", r.brent_brl) } else { String::new() };
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{}",
            r.date,
            r.time,
            r.post,
            r.time_post,
            cell(r.diesel),
            cell(r.gasoline),
            cell(r.brent_usd),
            cell(r.fx),
            brent_brl,
        )
        .map_err(|e| AppError::input(format!("Failed to write derived CSV row: {e}")))?;
    }

    Ok(())
}

/// Missing values are written as empty cells.
fn cell(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}

/// Render observations in the input schema (so the file can be re-ingested).
pub fn observations_to_csv(observations: &[Observation]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["data", "preco_diesel", "preco_gasolina", "preco_brent", "preco_dolar"])
        .map_err(|e| AppError::input(format!("Failed to write CSV header: {e}")))?;

    for o in observations {
        writer
            .write_record([
                o.date.to_string(),
                cell(o.diesel),
                cell(o.gasoline),
                cell(o.brent_usd),
                cell(o.fx),
            ])
            .map_err(|e| AppError::input(format!("Failed to write CSV row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::input(format!("Failed to finish CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::input(format!("CSV is not UTF-8: {e}")))
}

/// Write observations in the input schema.
pub fn write_observations_csv(path: &Path, observations: &[Observation]) -> Result<(), AppError> {
    let csv = observations_to_csv(observations)?;
    write_text(path, &csv)?;
    info!(path = %path.display(), rows = observations.len(), "wrote observations");
    Ok(())
}

/// Write a text artifact (Markdown report, SVG figure).
pub fn write_text(path: &Path, contents: &str) -> Result<(), AppError> {
    std::fs::write(path, contents)
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))
}
