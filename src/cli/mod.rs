//! Command-line parsing for the fuel-price intervention analysis.
//!
//! Argument parsing and command dispatch stay separate from the statistics code.
//! `.env` values (loaded by `app::run`) feed the `env` fallbacks below.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::{CovKind, DEFAULT_POLICY_DATE, DEFAULT_TRIM, Transform};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fuelbreak",
    version,
    about = "Intervention and structural-break analysis of fuel prices"
)]
pub struct Cli {
    /// Verbose logging (debug level) on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full analysis: tables, intervention models, break tests, figures.
    Analyze(AnalyzeArgs),
    /// Print the descriptive and correlation tables only.
    Describe(DescribeArgs),
    /// Write a synthetic price table with an injected level shift.
    Simulate(SimulateArgs),
    /// Re-print tables and diagnostics from a saved results JSON.
    Show(ShowArgs),
}

/// Options shared by every command that reads the price table.
#[derive(Debug, Parser, Clone)]
pub struct DataArgs {
    /// Price table (CSV: date, diesel, gasoline, Brent US$/bbl, R$/US$).
    #[arg(short, long, value_name = "CSV", env = "FUELBREAK_DATA")]
    pub data: PathBuf,

    /// First date of the post-policy regime (inclusive).
    #[arg(long, value_name = "YYYY-MM-DD", env = "FUELBREAK_POLICY_DATE", default_value = DEFAULT_POLICY_DATE)]
    pub policy_date: NaiveDate,

    /// Fail on date gaps instead of warning.
    #[arg(long)]
    pub strict_gaps: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Output directory for tables, report, and figures.
    #[arg(short, long, value_name = "DIR", env = "FUELBREAK_OUT", default_value = "output")]
    pub out: PathBuf,

    /// Model prices in levels or natural logs.
    #[arg(long, value_enum, default_value_t = Transform::Level)]
    pub transform: Transform,

    /// Coefficient covariance estimator.
    #[arg(long, value_enum, default_value_t = CovKind::Nonrobust)]
    pub cov: CovKind,

    /// Newey–West lag truncation (default: floor(4 (n/100)^(2/9))).
    #[arg(long)]
    pub hac_lags: Option<usize>,

    /// Fraction trimmed from each end of the sample in the sup-F scan.
    #[arg(long, default_value_t = DEFAULT_TRIM)]
    pub trim: f64,

    /// Skip the SVG figures.
    #[arg(long)]
    pub no_figures: bool,

    /// Print to the terminal only; write nothing to disk.
    #[arg(long)]
    pub no_export: bool,

    /// Render ASCII charts of each fuel with its fitted model.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Render ASCII charts of every series.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output CSV (input schema of `analyze`).
    #[arg(short, long, value_name = "CSV")]
    pub out: PathBuf,

    /// First monthly observation.
    #[arg(long, default_value = "2019-01-01")]
    pub start: NaiveDate,

    /// Number of monthly observations.
    #[arg(long, default_value_t = 72)]
    pub periods: usize,

    /// Policy date at which the shift is injected.
    #[arg(long, default_value = DEFAULT_POLICY_DATE)]
    pub policy_date: NaiveDate,

    /// Diesel level shift in R$/L (gasoline receives 75% of it).
    #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
    pub shift: f64,

    /// Per-period trend change after the policy date.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub trend_change: f64,

    /// Standard deviation of the price noise (R$/L).
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Results JSON written by `fuelbreak analyze`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_defaults() {
        let cli = Cli::parse_from(["fuelbreak", "analyze", "--data", "prices.csv"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.data.data, PathBuf::from("prices.csv"));
        assert_eq!(args.data.policy_date.to_string(), DEFAULT_POLICY_DATE);
        assert_eq!(args.cov, CovKind::Nonrobust);
        assert_eq!(args.trim, DEFAULT_TRIM);
        assert!(!cli.verbose);
    }

    #[test]
    fn analyze_falls_back_to_environment() {
        // SAFETY: no other test reads or writes these two variables.
        unsafe {
            std::env::set_var("FUELBREAK_DATA", "from-env.csv");
            std::env::set_var("FUELBREAK_OUT", "env-out");
        }
        let parsed = Cli::try_parse_from(["fuelbreak", "analyze"]);
        unsafe {
            std::env::remove_var("FUELBREAK_DATA");
            std::env::remove_var("FUELBREAK_OUT");
        }

        let Command::Analyze(args) = parsed.unwrap().command else {
            panic!("expected analyze");
        };
        assert_eq!(args.data.data, PathBuf::from("from-env.csv"));
        assert_eq!(args.out, PathBuf::from("env-out"));
    }

    #[test]
    fn simulate_accepts_negative_shift() {
        let cli = Cli::parse_from(["fuelbreak", "simulate", "--out", "x.csv", "--shift", "-0.3"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.shift, -0.3);
    }
}
