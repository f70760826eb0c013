//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during estimation
//! - exported to JSON/CSV
//! - rendered into thesis tables and figures

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default policy-change date: the May 2023 pricing-policy change.
pub const DEFAULT_POLICY_DATE: &str = "2023-05-01";

/// Default trimming fraction for the sup-F break scan.
pub const DEFAULT_TRIM: f64 = 0.15;

/// One aligned row of the input table.
///
/// A price that was empty or unusable in the input is `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    /// Diesel S10 price (R$/L).
    pub diesel: f64,
    /// Gasoline A price (R$/L).
    pub gasoline: f64,
    /// Brent crude price (US$/barrel).
    pub brent_usd: f64,
    /// Exchange rate (R$/US$).
    pub fx: f64,
}

impl Observation {
    /// Every price is present.
    pub fn is_complete(&self) -> bool {
        [self.diesel, self.gasoline, self.brent_usd, self.fx]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Which side of the policy date an observation falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Pre,
    Post,
}

impl Regime {
    pub const ALL: [Regime; 2] = [Regime::Pre, Regime::Post];

    pub fn of(date: NaiveDate, policy_date: NaiveDate) -> Self {
        if date >= policy_date { Regime::Post } else { Regime::Pre }
    }

    /// The 0/1 value of the intervention indicator.
    pub fn indicator(self) -> f64 {
        match self {
            Regime::Pre => 0.0,
            Regime::Post => 1.0,
        }
    }

    pub fn label(self, policy_date: NaiveDate) -> String {
        let month = policy_date.format("%b/%y");
        match self {
            Regime::Pre => format!("Before {month}"),
            Regime::Post => format!("After {month}"),
        }
    }
}

/// Dependent series of an intervention model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Gasoline,
    Diesel,
}

impl Target {
    /// Fitting order used for reports (gasoline is table 4, diesel table 5).
    pub const ALL: [Target; 2] = [Target::Gasoline, Target::Diesel];

    pub fn display_name(self) -> &'static str {
        match self {
            Target::Gasoline => "Gasoline A (R$/L)",
            Target::Diesel => "Diesel S10 (R$/L)",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Target::Gasoline => "gasoline",
            Target::Diesel => "diesel",
        }
    }

    pub fn value(self, obs: &Observation) -> f64 {
        match self {
            Target::Gasoline => obs.gasoline,
            Target::Diesel => obs.diesel,
        }
    }
}

/// How model variables enter the regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Prices and controls in levels.
    Level,
    /// Natural logs of the dependent price and of the continuous controls
    /// (`brent_brl`, `fx`); the time, dummy and interaction terms stay as-is.
    Log,
}

/// Covariance estimator for coefficient standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CovKind {
    /// Classical `s² (X'X)⁻¹`; Student-t inference.
    Nonrobust,
    /// White heteroskedasticity-robust sandwich with the `n/(n-k)` correction.
    Hc1,
    /// Newey–West heteroskedasticity and autocorrelation consistent estimator.
    Hac,
}

impl CovKind {
    pub fn display_name(self) -> &'static str {
        match self {
            CovKind::Nonrobust => "nonrobust",
            CovKind::Hc1 => "HC1",
            CovKind::Hac => "HAC (Newey-West)",
        }
    }
}

/// Sampling frequency inferred from the spacing between dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Irregular,
}

impl Frequency {
    /// Classify a median spacing (in days).
    pub fn from_median_spacing(days: i64) -> Self {
        match days {
            i64::MIN..=3 => Frequency::Daily,
            5..=9 => Frequency::Weekly,
            25..=35 => Frequency::Monthly,
            _ => Frequency::Irregular,
        }
    }

    /// Largest spacing (in days) that does not count as a gap.
    pub fn max_spacing(self, median_days: i64) -> i64 {
        match self {
            // Weekends and single holidays.
            Frequency::Daily => 5,
            Frequency::Weekly => 10,
            Frequency::Monthly => 35,
            Frequency::Irregular => 2 * median_days.max(1),
        }
    }
}

/// A hole in the date sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub after: NaiveDate,
    pub before: NaiveDate,
    pub days: i64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus `.env` defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub data_path: PathBuf,
    pub out_dir: PathBuf,
    pub policy_date: NaiveDate,
    pub transform: Transform,
    pub cov: CovKind,
    /// Newey–West lag truncation; `None` uses `floor(4 (n/100)^(2/9))`.
    pub hac_lags: Option<usize>,
    /// Fraction trimmed from each end of the sample in the sup-F scan.
    pub trim: f64,
    /// Treat date gaps as errors instead of warnings.
    pub strict_gaps: bool,
    pub figures: bool,
    pub export: bool,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl AnalysisConfig {
    /// Defaults of the May 2023 study, reading from `data_path`.
    pub fn with_data(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            out_dir: PathBuf::from("output"),
            policy_date: default_policy_date(),
            transform: Transform::Level,
            cov: CovKind::Nonrobust,
            hac_lags: None,
            trim: DEFAULT_TRIM,
            strict_gaps: false,
            figures: true,
            export: true,
            plot: false,
            plot_width: 100,
            plot_height: 20,
        }
    }
}

pub fn default_policy_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 1).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_boundary_is_inclusive() {
        let policy = default_policy_date();
        assert_eq!(Regime::of(policy, policy), Regime::Post);
        assert_eq!(Regime::of(policy.pred_opt().unwrap(), policy), Regime::Pre);
        assert_eq!(policy.to_string(), DEFAULT_POLICY_DATE);
    }

    #[test]
    fn frequency_classification() {
        assert_eq!(Frequency::from_median_spacing(1), Frequency::Daily);
        assert_eq!(Frequency::from_median_spacing(7), Frequency::Weekly);
        assert_eq!(Frequency::from_median_spacing(31), Frequency::Monthly);
        assert_eq!(Frequency::from_median_spacing(90), Frequency::Irregular);
        assert_eq!(Frequency::Irregular.max_spacing(90), 180);
    }
}
