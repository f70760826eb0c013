//! CSV ingest and normalization.
//!
//! This module is responsible for turning the pre-organized price table into a
//! clean, date-sorted sequence of aligned `Observation`s that is safe to fit.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** (skip rows without a usable date, but report what happened)
//! - **Missing values are kept** as `NaN` cells so the time index still counts
//!   every dated row; models drop incomplete rows, descriptives skip per column
//! - **Date alignment** (duplicates are fatal, gaps are reported)
//! - **Separation of concerns**: no derived variables or fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::domain::{Frequency, Gap, Observation};
use crate::error::AppError;
use crate::math::median_i64;

/// Canonical column names and the aliases accepted for each.
const COLUMNS: [(&str, &[&str]); 5] = [
    ("data", &["date"]),
    ("preco_diesel", &["diesel"]),
    ("preco_gasolina", &["gasoline", "gasolina"]),
    ("preco_brent", &["brent"]),
    ("preco_dolar", &["usd_brl", "fx", "dolar"]),
];

/// Knobs that change how strictly the table is validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Fail instead of warning when the date sequence has gaps.
    pub strict_gaps: bool,
}

/// A row-level error encountered during ingest (the row is skipped).
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// A price cell that was empty or unusable; the row is kept with `NaN` there.
#[derive(Debug, Clone)]
pub struct MissingValue {
    pub line: usize,
    pub date: NaiveDate,
    pub message: String,
}

/// Ingest output: sorted observations + row errors + data-hygiene findings.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub source: String,
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub missing_values: Vec<MissingValue>,
    pub rows_read: usize,
    /// Dated rows kept (including rows with missing prices).
    pub rows_used: usize,
    /// Rows with every price present.
    pub complete_rows: usize,
    pub frequency: Frequency,
    pub median_spacing_days: i64,
    pub gaps: Vec<Gap>,
}

impl IngestedData {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// Load observations from a CSV file on disk.
pub fn load_observations(path: &Path, options: IngestOptions) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    load_observations_from_reader(file, &path.display().to_string(), options)
}

/// Load observations from any reader (used by tests and by `load_observations`).
pub fn load_observations_from_reader<R: Read>(
    reader: R,
    source: &str,
    options: IngestOptions,
) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let columns = resolve_columns(&headers)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut missing_values = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok((obs, missing)) => {
                missing_values.extend(missing.into_iter().map(|message| MissingValue {
                    line,
                    date: obs.date,
                    message,
                }));
                observations.push(obs);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for e in &row_errors {
        debug!(line = e.line, message = %e.message, "skipped row");
    }
    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), source, "rows skipped during ingest");
    }
    for m in &missing_values {
        debug!(line = m.line, date = %m.date, message = %m.message, "missing value");
    }
    if !missing_values.is_empty() {
        warn!(missing = missing_values.len(), source, "missing price values kept as NaN");
    }

    if observations.len() < 2 {
        return Err(AppError::data(format!(
            "Need at least 2 valid rows, found {} (of {rows_read} read).",
            observations.len()
        )));
    }

    observations.sort_by_key(|o| o.date);
    ensure_unique_dates(&observations)?;

    let spacings: Vec<i64> = observations
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days())
        .collect();
    let median_spacing_days = median_i64(&spacings).unwrap_or(1);
    let frequency = Frequency::from_median_spacing(median_spacing_days);
    let gaps = find_gaps(&observations, frequency.max_spacing(median_spacing_days));

    for g in &gaps {
        warn!(after = %g.after, before = %g.before, days = g.days, "gap in date sequence");
    }
    if options.strict_gaps && !gaps.is_empty() {
        let g = &gaps[0];
        return Err(AppError::data(format!(
            "Date sequence has {} gap(s); first: {} -> {} ({} days).",
            gaps.len(),
            g.after,
            g.before,
            g.days
        )));
    }

    let rows_used = observations.len();
    let complete_rows = observations.iter().filter(|o| o.is_complete()).count();
    info!(source, rows_read, rows_used, complete_rows, ?frequency, "loaded observations");

    Ok(IngestedData {
        source: source.to_string(),
        observations,
        row_errors,
        missing_values,
        rows_read,
        rows_used,
        complete_rows,
        frequency,
        median_spacing_days,
        gaps,
    })
}

/// Column index of each canonical field.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    diesel: usize,
    gasoline: usize,
    brent: usize,
    fx: usize,
}

fn resolve_columns(headers: &StringRecord) -> Result<ColumnMap, AppError> {
    let header_map = build_header_map(headers);

    let mut found = [0usize; 5];
    let mut missing = Vec::new();
    for (slot, (canonical, aliases)) in COLUMNS.iter().enumerate() {
        let idx = std::iter::once(canonical)
            .chain(aliases.iter())
            .find_map(|name| header_map.get(*name).copied());
        match idx {
            Some(i) => found[slot] = i,
            None => missing.push(format!("`{canonical}`")),
        }
    }

    if !missing.is_empty() {
        return Err(AppError::input(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(ColumnMap {
        date: found[0],
        diesel: found[1],
        gasoline: found[2],
        brent: found[3],
        fx: found[4],
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    // First occurrence wins when a header is repeated.
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// A row needs a date; unusable prices become `NaN` and are reported alongside.
fn parse_row(record: &StringRecord, columns: &ColumnMap) -> Result<(Observation, Vec<String>), String> {
    let date = parse_date(get_required(record, columns.date, "data")?)?;
    let mut missing = Vec::new();
    let mut price = |idx: usize, name: &str| {
        parse_price(record, idx, name).unwrap_or_else(|message| {
            missing.push(message);
            f64::NAN
        })
    };
    let obs = Observation {
        date,
        diesel: price(columns.diesel, "preco_diesel"),
        gasoline: price(columns.gasoline, "preco_gasolina"),
        brent_usd: price(columns.brent, "preco_brent"),
        fx: price(columns.fx, "preco_dolar"),
    };
    Ok((obs, missing))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_price(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = get_required(record, idx, name)?;
    let v = parse_number(raw).ok_or_else(|| format!("Invalid number for `{name}`: '{raw}'"))?;
    if v <= 0.0 {
        return Err(format!("Non-positive value for `{name}`: {v}"));
    }
    Ok(v)
}

fn parse_number(s: &str) -> Option<f64> {
    // Brazilian spreadsheets write decimals with a comma. Only accept that form
    // when no dot is present, so "1,234.5" is never misread.
    let v = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".").parse::<f64>().ok()?
    } else {
        s.parse::<f64>().ok()?
    };
    if v.is_finite() { Some(v) } else { None }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // Spreadsheet exports of datetime columns append a midnight timestamp.
    let s = s.split([' ', 'T']).next().unwrap_or(s);
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

fn ensure_unique_dates(sorted: &[Observation]) -> Result<(), AppError> {
    if let Some(w) = sorted.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(AppError::data(format!(
            "Duplicate date {} in input; series must be aligned one row per date.",
            w[0].date
        )));
    }
    Ok(())
}

fn find_gaps(sorted: &[Observation], max_spacing: i64) -> Vec<Gap> {
    sorted
        .windows(2)
        .filter_map(|w| {
            let days = (w[1].date - w[0].date).num_days();
            (days > max_spacing).then_some(Gap {
                after: w[0].date,
                before: w[1].date,
                days,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> Result<IngestedData, AppError> {
        load_observations_from_reader(csv.as_bytes(), "test", IngestOptions::default())
    }

    #[test]
    fn loads_canonical_headers_and_sorts_by_date() {
        let csv = "data,preco_diesel,preco_gasolina,preco_brent,preco_dolar\n\
                   2023-02-01,6.1,3.3,83.0,5.2\n\
                   2023-01-01,6.0,3.2,82.0,5.1\n\
                   2023-03-01,6.2,3.4,80.0,5.0\n";
        let data = load(csv).unwrap();
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.observations[0].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(data.observations[2].brent_usd, 80.0);
        assert_eq!(data.frequency, Frequency::Monthly);
        assert!(data.gaps.is_empty());
    }

    #[test]
    fn accepts_aliases_bom_and_comma_decimals() {
        let csv = "\u{feff}Date;Diesel;Gasoline;Brent;USD_BRL\n".replace(';', ",")
            + "01/01/2023,\"6,01\",\"3,2\",82,\"5,1\"\n"
            + "01/02/2023,\"6,11\",\"3,3\",83,\"5,2\"\n";
        let data = load(&csv).unwrap();
        assert_eq!(data.rows_used, 2);
        assert!((data.observations[0].diesel - 6.01).abs() < 1e-12);
        assert!((data.observations[1].fx - 5.2).abs() < 1e-12);
    }

    #[test]
    fn missing_columns_are_listed() {
        let err = load("data,preco_diesel\n2023-01-01,6.0\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("preco_gasolina"));
        assert!(err.message().contains("preco_dolar"));
    }

    #[test]
    fn undated_rows_are_skipped_and_bad_prices_kept_as_missing() {
        let csv = "data,preco_diesel,preco_gasolina,preco_brent,preco_dolar\n\
                   2023-01-01,6.0,3.2,82.0,5.1\n\
                   not-a-date,6.0,3.2,82.0,5.1\n\
                   2023-02-01,,3.3,83.0,5.2\n\
                   2023-03-01,6.2,3.4,80.0,5.0\n\
                   2023-04-01,6.2,-1,80.0,5.0\n";
        let data = load(csv).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 4);
        assert_eq!(data.complete_rows, 2);

        let skipped: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(skipped, vec![3]);
        let missing: Vec<usize> = data.missing_values.iter().map(|m| m.line).collect();
        assert_eq!(missing, vec![4, 6]);

        assert!(data.observations[1].diesel.is_nan());
        assert_eq!(data.observations[1].gasoline, 3.3);
        assert!(data.observations[3].gasoline.is_nan());
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let csv = "data,preco_diesel,preco_gasolina,preco_brent,preco_dolar\n\
                   2023-01-01,6.0,3.2,82.0,5.1\n\
                   2023-01-01,6.1,3.3,83.0,5.2\n";
        let err = load(csv).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn gaps_warn_by_default_and_fail_when_strict() {
        let csv = "data,preco_diesel,preco_gasolina,preco_brent,preco_dolar\n\
                   2023-01-01,6.0,3.2,82.0,5.1\n\
                   2023-02-01,6.1,3.3,83.0,5.2\n\
                   2023-03-01,6.2,3.4,80.0,5.0\n\
                   2023-06-01,6.2,3.4,80.0,5.0\n\
                   2023-07-01,6.2,3.4,80.0,5.0\n";
        let data = load(csv).unwrap();
        assert_eq!(data.gaps.len(), 1);
        assert_eq!(data.gaps[0].days, 92);

        let err = load_observations_from_reader(
            csv.as_bytes(),
            "test",
            IngestOptions { strict_gaps: true },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn datetime_suffix_is_dropped() {
        assert_eq!(
            parse_date("2023-05-01 00:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
        );
    }

    #[test]
    fn too_few_rows_is_a_data_error() {
        let csv = "data,preco_diesel,preco_gasolina,preco_brent,preco_dolar\n\
                   2023-01-01,6.0,3.2,82.0,5.1\n";
        assert_eq!(load(csv).unwrap_err().exit_code(), 3);
    }
}
