//! Markdown report bundling every table with the run metadata.
//!
//! The file is meant to be pasted into (or included by) the thesis text.

use chrono::Local;

use crate::domain::AnalysisConfig;
use crate::fit::breaks::BreakTests;
use crate::fit::regression::InterventionFit;
use crate::io::ingest::IngestedData;
use crate::models::DerivedData;
use crate::report::format::fmt_p;
use crate::report::tables::Table;

/// Render the Markdown report.
pub fn render_markdown(
    ingest: &IngestedData,
    derived: &DerivedData,
    config: &AnalysisConfig,
    tables: &[Table],
    fits: &[InterventionFit],
    breaks: &[BreakTests],
) -> String {
    let mut out = String::new();

    out.push_str("# Fuel price intervention analysis\n\n");
    out.push_str(&format!("- generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!("- source: `{}`\n", ingest.source));
    if let (Some(first), Some(last)) = (ingest.first_date(), ingest.last_date()) {
        out.push_str(&format!("- span: {first} .. {last} ({} rows, {:?})\n", ingest.rows_used, ingest.frequency));
    }
    out.push_str(&format!("- skipped rows: {}\n", ingest.row_errors.len()));
    out.push_str(&format!(
        "- missing values: {} (complete rows: {})\n",
        ingest.missing_values.len(),
        ingest.complete_rows
    ));
    out.push_str(&format!("- date gaps: {}\n", ingest.gaps.len()));
    out.push_str(&format!("- policy date: {}\n", derived.policy_date));
    out.push_str(&format!("- transform: {:?}\n", config.transform));
    out.push_str(&format!("- covariance: {}\n", config.cov.display_name()));
    out.push_str(&format!("- sup-F trim: {:.2}\n\n", config.trim));

    out.push_str("## Model\n\n");
    out.push_str("`y = b0 + b1*time + b2*post + b3*time_post + b4*brent_brl + b5*fx + e`\n\n");
    out.push_str("`post` marks observations on or after the policy date; ");
    out.push_str("`brent_brl` is Brent converted to R$ per barrel.\n\n");

    out.push_str("## Tables\n\n");
    for table in tables {
        out.push_str(&table.to_markdown());
        out.push('\n');
    }

    out.push_str("## Fit statistics\n\n");
    out.push_str("| model | n | R² | adj. R² | F | p(F) | DW | JB | p(JB) | AIC | BIC |\n");
    out.push_str("| :--- | ---: | ---: | ---: | ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for fit in fits {
        let o = &fit.ols;
        out.push_str(&format!(
            "| {} | {} | {:.4} | {:.4} | {:.3} | {} | {:.3} | {:.3} | {} | {:.2} | {:.2} |\n",
            fit.target.display_name(),
            o.n,
            o.r_squared,
            o.adj_r_squared,
            o.f_stat,
            fmt_p(o.f_p_value),
            o.durbin_watson,
            o.jarque_bera,
            fmt_p(o.jb_p_value),
            o.aic,
            o.bic,
        ));
    }
    out.push('\n');

    let notes: Vec<String> = breaks
        .iter()
        .flat_map(|t| t.skipped.iter().map(move |r| format!("- {}: {r}", t.target.short_name())))
        .collect();
    if !notes.is_empty() {
        out.push_str("## Skipped tests\n\n");
        out.push_str(&notes.join("\n"));
        out.push_str("\n\n");
    }
    out.push_str("sup-F p-values are nominal and not adjusted for the search over break dates.\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_analysis_with_data;
    use crate::data::{SampleConfig, generate_sample};
    use crate::io::export::observations_to_csv;
    use crate::io::ingest::{IngestOptions, load_observations_from_reader};

    #[test]
    fn report_contains_every_table_and_fit_row() {
        let csv = observations_to_csv(&generate_sample(&SampleConfig::default()).unwrap()).unwrap();
        let ingest = load_observations_from_reader(csv.as_bytes(), "synthetic", IngestOptions::default()).unwrap();
        let config = AnalysisConfig::with_data("synthetic");
        let run = run_analysis_with_data(&config, ingest).unwrap();

        let md = render_markdown(&run.ingest, &run.derived, &config, &run.tables, &run.fits, &run.breaks);
        assert!(md.starts_with("# Fuel price intervention analysis\n"));
        assert!(md.contains("- policy date: 2023-05-01"));
        for table in &run.tables {
            assert!(md.contains(&table.title), "missing {}", table.title);
        }
        assert!(md.contains("| Diesel S10 (R$/L) | 72 |"));
        assert!(!md.contains("## Skipped tests"));
    }
}
