//! Constructed variables for the intervention models.
//!
//! For observation `i` (1-based, after sorting by date, counting rows with
//! missing prices too):
//!
//! - `time = i`
//! - `post = 1` if `date >= policy_date`, else `0`
//! - `time_post = time * post`
//! - `brent_brl = brent_usd * fx` (Brent in R$/barrel)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Observation, Regime, Target};

/// One observation with its constructed variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub date: NaiveDate,
    pub time: f64,
    pub regime: Regime,
    pub post: f64,
    pub time_post: f64,
    pub diesel: f64,
    pub gasoline: f64,
    pub brent_usd: f64,
    pub fx: f64,
    pub brent_brl: f64,
}

impl DerivedRow {
    pub fn target(&self, target: Target) -> f64 {
        match target {
            Target::Gasoline => self.gasoline,
            Target::Diesel => self.diesel,
        }
    }
}

/// The four series shown in descriptive tables and figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Series {
    Diesel,
    Gasoline,
    BrentBrl,
    Fx,
}

impl Series {
    pub const ALL: [Series; 4] = [Series::Diesel, Series::Gasoline, Series::BrentBrl, Series::Fx];

    pub fn display_name(self) -> &'static str {
        match self {
            Series::Diesel => "Diesel S10 (R$/L)",
            Series::Gasoline => "Gasoline A (R$/L)",
            Series::BrentBrl => "Brent (R$/bbl)",
            Series::Fx => "FX (R$/US$)",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Series::Diesel => "diesel",
            Series::Gasoline => "gasoline",
            Series::BrentBrl => "brent_brl",
            Series::Fx => "fx",
        }
    }

    pub fn value(self, row: &DerivedRow) -> f64 {
        match self {
            Series::Diesel => row.diesel,
            Series::Gasoline => row.gasoline,
            Series::BrentBrl => row.brent_brl,
            Series::Fx => row.fx,
        }
    }
}

/// The full derived table plus the policy date it was built against.
#[derive(Debug, Clone)]
pub struct DerivedData {
    pub policy_date: NaiveDate,
    pub rows: Vec<DerivedRow>,
}

impl DerivedData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first post-policy row, if both regimes are present.
    pub fn policy_break_index(&self) -> Option<usize> {
        let idx = self.rows.iter().position(|r| r.regime == Regime::Post)?;
        (idx > 0).then_some(idx)
    }

    pub fn regime_count(&self, regime: Regime) -> usize {
        self.rows.iter().filter(|r| r.regime == regime).count()
    }

    /// Rows of one regime, in date order.
    pub fn regime_rows(&self, regime: Regime) -> impl Iterator<Item = &DerivedRow> {
        self.rows.iter().filter(move |r| r.regime == regime)
    }

    pub fn column(&self, f: impl Fn(&DerivedRow) -> f64) -> Vec<f64> {
        self.rows.iter().map(f).collect()
    }

    pub fn series(&self, series: Series) -> Vec<f64> {
        self.column(|r| series.value(r))
    }

    pub fn regime_series(&self, series: Series, regime: Regime) -> Vec<f64> {
        self.regime_rows(regime).map(|r| series.value(r)).collect()
    }
}

/// Build the derived table from date-sorted observations.
pub fn derive(observations: &[Observation], policy_date: NaiveDate) -> DerivedData {
    let rows = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let time = (i + 1) as f64;
            let regime = Regime::of(obs.date, policy_date);
            let post = regime.indicator();
            DerivedRow {
                date: obs.date,
                time,
                regime,
                post,
                time_post: time * post,
                diesel: obs.diesel,
                gasoline: obs.gasoline,
                brent_usd: obs.brent_usd,
                fx: obs.fx,
                brent_brl: obs.brent_usd * obs.fx,
            }
        })
        .collect();

    DerivedData { policy_date, rows }
}
