//! Design matrices for the intervention and break-test regressions.
//!
//! Two regressor sets are used:
//!
//! - the intervention model: `1, time, post, time_post, brent_brl, fx`
//! - the break-test base model: `1, time, brent_brl, fx`
//!
//! Under `Transform::Log`, the response and the continuous controls enter as
//! natural logs. Ingest turns non-positive prices into missing values, so the
//! logs are finite wherever the level is.
//!
//! Rows with a missing value in any model column are left out of that model only.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{Target, Transform};
use crate::error::AppError;
use crate::models::derive::DerivedRow;

/// A model column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regressor {
    Intercept,
    Time,
    Post,
    TimePost,
    BrentBrl,
    Fx,
}

impl Regressor {
    pub fn name(self) -> &'static str {
        match self {
            Regressor::Intercept => "Intercept",
            Regressor::Time => "time",
            Regressor::Post => "post",
            Regressor::TimePost => "time_post",
            Regressor::BrentBrl => "brent_brl",
            Regressor::Fx => "fx",
        }
    }

    /// Column label including the transform (e.g. `ln(fx)`).
    pub fn label(self, transform: Transform) -> String {
        match (self, transform) {
            (Regressor::BrentBrl | Regressor::Fx, Transform::Log) => format!("ln({})", self.name()),
            _ => self.name().to_string(),
        }
    }

    fn value(self, row: &DerivedRow, transform: Transform) -> f64 {
        let raw = match self {
            Regressor::Intercept => return 1.0,
            Regressor::Time => return row.time,
            Regressor::Post => return row.post,
            Regressor::TimePost => return row.time_post,
            Regressor::BrentBrl => row.brent_brl,
            Regressor::Fx => row.fx,
        };
        apply_transform(raw, transform)
    }
}

/// Regressors of the intervention model (level shift + trend change + controls).
pub const INTERVENTION_REGRESSORS: [Regressor; 6] = [
    Regressor::Intercept,
    Regressor::Time,
    Regressor::Post,
    Regressor::TimePost,
    Regressor::BrentBrl,
    Regressor::Fx,
];

/// Regressors whose stability the Chow / sup-F tests examine.
pub const BREAK_TEST_REGRESSORS: [Regressor; 4] = [
    Regressor::Intercept,
    Regressor::Time,
    Regressor::BrentBrl,
    Regressor::Fx,
];

fn apply_transform(v: f64, transform: Transform) -> f64 {
    match transform {
        Transform::Level => v,
        Transform::Log => v.ln(),
    }
}

/// Fill a design row for the given regressor set.
///
/// # Panics
/// Panics if `out` does not have length `regressors.len()`.
pub fn fill_design_row(regressors: &[Regressor], row: &DerivedRow, transform: Transform, out: &mut [f64]) {
    for (slot, reg) in out.iter_mut().zip(regressors) {
        *slot = reg.value(row, transform);
    }
}

/// Response value (`y`) for the given target.
pub fn response(row: &DerivedRow, target: Target, transform: Transform) -> f64 {
    apply_transform(row.target(target), transform)
}

/// A design matrix plus the indices (into the input slice) of the rows it uses.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub rows: Vec<usize>,
}

impl Design {
    pub fn n(&self) -> usize {
        self.rows.len()
    }
}

/// Build `(X, y)` from the rows whose model columns are all present.
pub fn build_design(
    rows: &[DerivedRow],
    regressors: &[Regressor],
    target: Target,
    transform: Transform,
) -> Result<Design, AppError> {
    let k = regressors.len();
    let mut values = Vec::with_capacity(rows.len() * k);
    let mut ys = Vec::with_capacity(rows.len());
    let mut used = Vec::with_capacity(rows.len());
    let mut buf = vec![0.0; k];

    for (i, row) in rows.iter().enumerate() {
        fill_design_row(regressors, row, transform, &mut buf);
        let y = response(row, target, transform);
        if !(y.is_finite() && buf.iter().all(|v| v.is_finite())) {
            continue;
        }
        values.extend_from_slice(&buf);
        ys.push(y);
        used.push(i);
    }

    if used.is_empty() {
        return Err(AppError::data(format!(
            "No complete rows for the {} model.",
            target.short_name()
        )));
    }

    Ok(Design {
        x: DMatrix::from_row_slice(used.len(), k, &values),
        y: DVector::from_vec(ys),
        rows: used,
    })
}

/// Column labels for a regressor set.
pub fn regressor_labels(regressors: &[Regressor], transform: Transform) -> Vec<String> {
    regressors.iter().map(|r| r.label(transform)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use crate::models::derive;
    use chrono::NaiveDate;

    fn sample() -> Vec<DerivedRow> {
        let d = |m| NaiveDate::from_ymd_opt(2023, m, 1).unwrap();
        let obs = [
            Observation { date: d(4), diesel: 6.0, gasoline: 3.0, brent_usd: 80.0, fx: 5.0 },
            Observation { date: d(5), diesel: 5.5, gasoline: 2.8, brent_usd: 75.0, fx: 4.9 },
        ];
        derive(&obs, d(5)).rows
    }

    #[test]
    fn intervention_design_columns() {
        let rows = sample();
        let Design { x, y, rows: used } =
            build_design(&rows, &INTERVENTION_REGRESSORS, Target::Diesel, Transform::Level).unwrap();
        assert_eq!(used, vec![0, 1]);
        assert_eq!(x.nrows(), 2);
        assert_eq!(x.ncols(), 6);
        assert_eq!(x.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 1.0, 2.0, 75.0 * 4.9, 4.9]);
        assert_eq!(y[0], 6.0);
    }

    #[test]
    fn log_transform_applies_to_response_and_controls_only() {
        let rows = sample();
        let Design { x, y, .. } =
            build_design(&rows, &INTERVENTION_REGRESSORS, Target::Gasoline, Transform::Log).unwrap();
        assert!((y[0] - 3.0_f64.ln()).abs() < 1e-12);
        assert_eq!(x[(0, 1)], 1.0);
        assert!((x[(0, 5)] - 5.0_f64.ln()).abs() < 1e-12);
        assert_eq!(Regressor::Fx.label(Transform::Log), "ln(fx)");
        assert_eq!(Regressor::Post.label(Transform::Log), "post");
    }

    #[test]
    fn incomplete_rows_are_left_out_of_that_model_only() {
        let d = |m| NaiveDate::from_ymd_opt(2023, m, 1).unwrap();
        let obs = [
            Observation { date: d(3), diesel: 6.1, gasoline: 3.1, brent_usd: 81.0, fx: 5.1 },
            Observation { date: d(4), diesel: f64::NAN, gasoline: 3.0, brent_usd: 80.0, fx: 5.0 },
            Observation { date: d(5), diesel: 5.5, gasoline: 2.8, brent_usd: 75.0, fx: 4.9 },
        ];
        let rows = derive(&obs, d(5)).rows;

        let diesel = build_design(&rows, &INTERVENTION_REGRESSORS, Target::Diesel, Transform::Level).unwrap();
        assert_eq!(diesel.rows, vec![0, 2]);
        // time keeps counting across the gap
        assert_eq!(diesel.x[(1, 1)], 3.0);

        let gasoline = build_design(&rows, &INTERVENTION_REGRESSORS, Target::Gasoline, Transform::Level).unwrap();
        assert_eq!(gasoline.n(), 3);
    }
}
