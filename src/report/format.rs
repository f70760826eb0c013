//! Formatted terminal output.

use crate::domain::{AnalysisConfig, Regime, Target};
use crate::fit::breaks::BreakTests;
use crate::fit::regression::InterventionFit;
use crate::io::ingest::IngestedData;
use crate::math::five_number_summary;
use crate::models::{DerivedData, Series};
use crate::report::tables::Table;

/// Format the run summary (data provenance + hygiene + regime split).
pub fn format_run_summary(ingest: &IngestedData, derived: &DerivedData, config: &AnalysisConfig) -> String {
    let mut out = String::new();

    out.push_str("=== fuelbreak - intervention analysis of fuel prices ===\n");
    out.push_str(&format!("Source: {}\n", ingest.source));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} complete={} missing values={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.complete_rows,
        ingest.missing_values.len()
    ));
    if let (Some(first), Some(last)) = (ingest.first_date(), ingest.last_date()) {
        out.push_str(&format!("Span: {first} .. {last}\n"));
    }
    out.push_str(&format!(
        "Frequency: {:?} (median spacing {} days) | gaps={}\n",
        ingest.frequency,
        ingest.median_spacing_days,
        ingest.gaps.len()
    ));
    for g in ingest.gaps.iter().take(5) {
        out.push_str(&format!("  gap: {} -> {} ({} days)\n", g.after, g.before, g.days));
    }
    if ingest.gaps.len() > 5 {
        out.push_str(&format!("  ... {} more\n", ingest.gaps.len() - 5));
    }
    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  skipped line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more skipped rows\n", ingest.row_errors.len() - 5));
    }
    for m in ingest.missing_values.iter().take(5) {
        out.push_str(&format!("  missing line {} ({}): {}\n", m.line, m.date, m.message));
    }
    if ingest.missing_values.len() > 5 {
        out.push_str(&format!("  ... {} more missing values\n", ingest.missing_values.len() - 5));
    }

    out.push_str(&format!(
        "Policy date: {} | pre n={} | post n={}\n",
        derived.policy_date,
        derived.regime_count(Regime::Pre),
        derived.regime_count(Regime::Post)
    ));
    out.push_str(&format!(
        "Transform: {:?} | covariance: {}\n",
        config.transform,
        config.cov.display_name()
    ));
    out.push('\n');

    out
}

/// Format every table as aligned text, separated by blank lines.
pub fn format_tables(tables: &[Table]) -> String {
    tables
        .iter()
        .map(Table::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format per-model fit diagnostics.
pub fn format_model_diagnostics(fits: &[InterventionFit]) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics:\n");
    for fit in fits {
        let o = &fit.ols;
        out.push_str(&format!(
            "- {:<18} n={} R2={:.4} adjR2={:.4} F={:.3} (p={}) DW={:.3} JB={:.3} (p={}) AIC={:.3} BIC={:.3} cond={:.1}",
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
            o.condition_number,
        ));
        if let Some(lags) = o.hac_lags {
            out.push_str(&format!(" lags={lags}"));
        }
        out.push('\n');

        if let (Some(shift), Some(pre), Some(post)) = (fit.level_shift(), fit.pre_trend(), fit.post_trend()) {
            out.push_str(&format!(
                "  level shift {:+.4} (p={}) | trend {:+.4} -> {:+.4} per period\n",
                shift.estimate,
                fmt_p(shift.p_value),
                pre,
                post
            ));
        }
    }
    out
}

/// Text counterpart of the regime box plots: five-number summary per fuel and regime.
pub fn format_regime_quartiles(derived: &DerivedData) -> String {
    let mut out = String::new();
    out.push_str("Price by regime [min, q1, median, q3, max]:\n");
    for target in Target::ALL {
        let series = match target {
            Target::Diesel => Series::Diesel,
            Target::Gasoline => Series::Gasoline,
        };
        for regime in Regime::ALL {
            let label = regime.label(derived.policy_date);
            match five_number_summary(&derived.regime_series(series, regime)) {
                Some(s) => out.push_str(&format!(
                    "- {:<18} {:<14} {:.3} {:.3} {:.3} {:.3} {:.3}\n",
                    target.display_name(),
                    label,
                    s[0],
                    s[1],
                    s[2],
                    s[3],
                    s[4]
                )),
                None => out.push_str(&format!("- {:<18} {label:<14} (no observations)\n", target.display_name())),
            }
        }
    }
    out
}

/// Format skipped break tests (if any).
pub fn format_break_notes(tests: &[BreakTests]) -> String {
    let mut out = String::new();
    for t in tests {
        for reason in &t.skipped {
            out.push_str(&format!("  (skipped for {}) {reason}\n", t.target.short_name()));
        }
    }
    if tests.iter().any(|t| t.scan.is_some()) {
        out.push_str("Note: sup-F p-values are nominal (not adjusted for the search over break dates).\n");
    }
    out
}

/// p-values below display precision print as `<0.0001`.
pub fn fmt_p(p: f64) -> String {
    if !p.is_finite() {
        "-".to_string()
    } else if p < 1e-4 {
        "<0.0001".to_string()
    } else {
        format!("{p:.4}")
    }
}
