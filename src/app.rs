//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` defaults and parses CLI arguments
//! - sets up logging
//! - runs the analysis pipeline
//! - prints reports/plots and writes outputs

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Cli, Command, DescribeArgs, ShowArgs, SimulateArgs};
use crate::data::{SampleConfig, generate_sample};
use crate::domain::AnalysisConfig;
use crate::error::AppError;
use crate::io::ingest::IngestOptions;
use crate::models::Series;
use crate::report::{
    format_break_notes, format_model_diagnostics, format_regime_quartiles, format_run_summary, format_tables,
};

pub mod pipeline;

/// Entry point for the `fuelbreak` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `fuelbreak --data x.csv` behaves like `fuelbreak analyze --data x.csv`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze(args) => handle_analyze(&args),
        Command::Describe(args) => handle_describe(&args),
        Command::Simulate(args) => handle_simulate(&args),
        Command::Show(args) => handle_show(&args),
    }
}

/// Log to stderr; `RUST_LOG` wins over the `--verbose` default.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<(), AppError> {
    let config = config_from_args(args);
    debug!(?config, "analysis config");
    let run = pipeline::run_analysis(&config)?;

    println!("{}", format_run_summary(&run.ingest, &run.derived, &config));
    println!("{}", format_tables(&run.tables));
    println!("{}", format_regime_quartiles(&run.derived));
    println!("{}", format_model_diagnostics(&run.fits));
    let notes = format_break_notes(&run.breaks);
    if !notes.is_empty() {
        println!("{notes}");
    }

    if config.plot {
        for fit in &run.fits {
            println!(
                "{}",
                crate::plot::render_fit_plot(&run.derived, fit, config.plot_width, config.plot_height)
            );
        }
    }

    if config.export {
        let written = pipeline::write_outputs(&config, &run)?;
        println!("Wrote {} files to {}", written.len(), config.out_dir.display());
    }

    Ok(())
}

fn handle_describe(args: &DescribeArgs) -> Result<(), AppError> {
    let (ingest, derived, tables) = pipeline::run_describe(
        &args.data.data,
        args.data.policy_date,
        IngestOptions {
            strict_gaps: args.data.strict_gaps,
        },
    )?;

    let mut config = AnalysisConfig::with_data(&args.data.data);
    config.policy_date = args.data.policy_date;
    println!("{}", format_run_summary(&ingest, &derived, &config));
    println!("{}", format_tables(&tables));
    println!("{}", format_regime_quartiles(&derived));

    if args.plot {
        for series in Series::ALL {
            println!(
                "{}",
                crate::plot::render_series_plot(&derived, series, args.width, args.height)
            );
        }
    }
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let sample = SampleConfig {
        start: args.start,
        periods: args.periods,
        policy_date: args.policy_date,
        shift: args.shift,
        trend_change: args.trend_change,
        noise: args.noise,
        seed: args.seed,
    };
    let observations = generate_sample(&sample)?;
    crate::io::export::write_observations_csv(&args.out, &observations)?;
    info!(seed = args.seed, shift = args.shift, "simulated sample");
    println!("Wrote {} observations to {}", observations.len(), args.out.display());
    Ok(())
}

fn handle_show(args: &ShowArgs) -> Result<(), AppError> {
    let results = crate::io::results::read_results_json(&args.results)?;
    let s = &results.sample;

    println!("=== fuelbreak results: {} ===", args.results.display());
    println!("Source: {}", s.source);
    if let (Some(first), Some(last)) = (s.first_date, s.last_date) {
        println!(
            "Span: {first} .. {last} ({} rows used, {} skipped, {} missing values)",
            s.rows_used, s.rows_skipped, s.missing_values
        );
    }
    println!(
        "Policy date: {} | transform: {:?} | covariance: {}\n",
        results.config.policy_date,
        results.config.transform,
        results.config.cov.display_name()
    );
    println!("{}", format_tables(&results.tables));
    println!("{}", format_model_diagnostics(&results.fits));
    let notes = format_break_notes(&results.breaks);
    if !notes.is_empty() {
        println!("{notes}");
    }
    Ok(())
}

pub fn config_from_args(args: &AnalyzeArgs) -> AnalysisConfig {
    AnalysisConfig {
        data_path: args.data.data.clone(),
        out_dir: args.out.clone(),
        policy_date: args.data.policy_date,
        transform: args.transform,
        cov: args.cov,
        hac_lags: args.hac_lags,
        trim: args.trim,
        strict_gaps: args.data.strict_gaps,
        figures: !args.no_figures,
        export: !args.no_export,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
    }
}

/// Rewrite argv so bare flags default to `analyze`.
///
/// Rules:
/// - `fuelbreak`                     -> unchanged (clap prints usage)
/// - `fuelbreak --data x.csv ...`    -> `fuelbreak analyze --data x.csv ...`
/// - `fuelbreak --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "analyze" | "describe" | "simulate" | "show");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "analyze".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_only_default_to_analyze() {
        assert_eq!(
            rewrite_args(args(&["fuelbreak", "--data", "x.csv"])),
            args(&["fuelbreak", "analyze", "--data", "x.csv"])
        );
        assert_eq!(
            rewrite_args(args(&["fuelbreak", "-v", "--data", "x.csv"])),
            args(&["fuelbreak", "analyze", "-v", "--data", "x.csv"])
        );
    }

    #[test]
    fn subcommands_help_and_empty_are_untouched() {
        for v in [
            args(&["fuelbreak"]),
            args(&["fuelbreak", "--help"]),
            args(&["fuelbreak", "describe", "--data", "x.csv"]),
            args(&["fuelbreak", "show", "--results", "r.json"]),
        ] {
            assert_eq!(rewrite_args(v.clone()), v);
        }
    }

    #[test]
    fn config_maps_negated_flags() {
        let cli = Cli::parse_from(["fuelbreak", "analyze", "--data", "x.csv", "--no-figures", "--cov", "hac"]);
        let Command::Analyze(a) = cli.command else {
            panic!("expected analyze");
        };
        let config = config_from_args(&a);
        assert!(!config.figures);
        assert!(config.export);
        assert_eq!(config.cov, crate::domain::CovKind::Hac);
    }
}
