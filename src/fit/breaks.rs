//! Structural-break tests on the base model `y ~ 1 + time + brent_brl + fx`.
//!
//! - Chow test at a hypothesized break (the policy date):
//!
//!   `F = ((SSE_r - SSE_u) / k) / (SSE_u / (n - 2k))`, with `SSE_u = SSE_pre + SSE_post`
//!
//! - Quandt–Andrews sup-F: the Chow F evaluated at every candidate break in the
//!   trimmed interior of the sample; the argmax is the least-squares break date.
//!   The reported p-value for the sup-F point is the nominal F(k, n-2k) one and
//!   is not adjusted for the search.
//!
//! Both run on the rows with every model column present; break indices count
//! positions in that complete-row sample.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::{info, warn};

use crate::domain::Target;
use crate::error::AppError;
use crate::fit::ModelOptions;
use crate::math::solve_least_squares;
use crate::models::{BREAK_TEST_REGRESSORS, DerivedData, build_design};

/// Chow test result at one break index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChowTest {
    pub target: Target,
    /// First row of the second regime, within the complete-row sample.
    pub break_index: usize,
    pub break_date: NaiveDate,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub f_stat: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub p_value: f64,
    pub df_num: usize,
    pub df_den: usize,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub sse_restricted: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub sse_pre: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub sse_post: f64,
}

/// Sup-F scan over candidate break dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakScan {
    pub target: Target,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub trim: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub sup_f: f64,
    pub break_index: usize,
    pub break_date: NaiveDate,
    /// Nominal F(k, n-2k) p-value of the sup-F point.
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub nominal_p_value: f64,
    /// `(candidate date, F)` for every candidate, in date order.
    #[serde(deserialize_with = "crate::math::nullable::dated_f64_or_nan")]
    pub path: Vec<(NaiveDate, f64)>,
}

/// Every break test for one target; tests that could not run are listed in `skipped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakTests {
    pub target: Target,
    pub chow: Option<ChowTest>,
    pub scan: Option<BreakScan>,
    pub skipped: Vec<String>,
}

/// Shared full-sample design so each candidate only re-solves the two halves.
struct BreakProblem {
    x: DMatrix<f64>,
    y: DVector<f64>,
    /// Date of each design row.
    dates: Vec<NaiveDate>,
    sse_restricted: f64,
    k: usize,
    n: usize,
}

impl BreakProblem {
    fn new(data: &DerivedData, target: Target, opts: &ModelOptions) -> Result<Self, AppError> {
        let design = build_design(&data.rows, &BREAK_TEST_REGRESSORS, target, opts.transform)?;
        let sse_restricted = segment_sse(&design.x, &design.y, 0, design.n())?;
        Ok(Self {
            n: design.n(),
            k: design.x.ncols(),
            dates: design.rows.iter().map(|&i| data.rows[i].date).collect(),
            x: design.x,
            y: design.y,
            sse_restricted,
        })
    }

    /// First design row on or after the policy date, if both regimes are present.
    fn policy_index(&self, policy_date: NaiveDate) -> Option<usize> {
        self.dates
            .iter()
            .position(|d| *d >= policy_date)
            .filter(|&i| i > 0)
    }

    /// Smallest segment size that leaves residual degrees of freedom.
    fn min_segment(&self) -> usize {
        self.k + 1
    }

    fn chow_f(&self, break_index: usize) -> Result<(f64, f64, f64), AppError> {
        let sse_pre = segment_sse(&self.x, &self.y, 0, break_index)?;
        let sse_post = segment_sse(&self.x, &self.y, break_index, self.n - break_index)?;
        let sse_u = sse_pre + sse_post;
        let df_den = (self.n - 2 * self.k) as f64;
        let f = ((self.sse_restricted - sse_u).max(0.0) / self.k as f64) / (sse_u / df_den);
        Ok((f, sse_pre, sse_post))
    }

    fn p_value(&self, f: f64) -> Result<f64, AppError> {
        upper_tail_p(f, self.k as f64, (self.n - 2 * self.k) as f64)
    }
}

/// `P(F(df1, df2) > f)`. An infinite statistic gives 0; an undefined one stays NaN.
pub fn upper_tail_p(f: f64, df1: f64, df2: f64) -> Result<f64, AppError> {
    if f.is_nan() {
        return Ok(f64::NAN);
    }
    if f == f64::INFINITY {
        return Ok(0.0);
    }
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|e| AppError::numeric(format!("Failed to create F distribution: {e}")))?;
    Ok(1.0 - dist.cdf(f))
}

fn segment_sse(x: &DMatrix<f64>, y: &DVector<f64>, start: usize, len: usize) -> Result<f64, AppError> {
    let xs = x.rows(start, len).into_owned();
    let ys = y.rows(start, len).into_owned();
    let beta = solve_least_squares(&xs, &ys)
        .ok_or_else(|| AppError::numeric("Least squares solve failed in break test segment."))?;
    Ok((ys - xs * beta).norm_squared())
}

/// Chow test with the second regime starting at `break_index` (a position in
/// the complete-row sample).
pub fn chow_test(
    data: &DerivedData,
    target: Target,
    break_index: usize,
    opts: &ModelOptions,
) -> Result<ChowTest, AppError> {
    let problem = BreakProblem::new(data, target, opts)?;
    chow_from_problem(&problem, target, break_index)
}

fn chow_from_problem(
    problem: &BreakProblem,
    target: Target,
    break_index: usize,
) -> Result<ChowTest, AppError> {
    let min = problem.min_segment();
    if break_index < min || problem.n.saturating_sub(break_index) < min {
        return Err(AppError::data(format!(
            "Chow test needs at least {min} observations on each side of the break \
             (have {} before, {} after).",
            break_index,
            problem.n.saturating_sub(break_index)
        )));
    }

    let (f_stat, sse_pre, sse_post) = problem.chow_f(break_index)?;
    Ok(ChowTest {
        target,
        break_index,
        break_date: problem.dates[break_index],
        f_stat,
        p_value: problem.p_value(f_stat)?,
        df_num: problem.k,
        df_den: problem.n - 2 * problem.k,
        sse_restricted: problem.sse_restricted,
        sse_pre,
        sse_post,
    })
}

/// Candidate break indices for a trimming fraction: `[ceil(trim·n), n - ceil(trim·n)]`,
/// narrowed so both segments keep residual degrees of freedom.
pub fn candidate_range(n: usize, k: usize, trim: f64) -> Option<(usize, usize)> {
    let m = (trim * n as f64).ceil() as usize;
    let lo = m.max(k + 1);
    let hi = n.saturating_sub(m).min(n.saturating_sub(k + 1));
    (lo <= hi).then_some((lo, hi))
}

/// Quandt–Andrews sup-F scan.
pub fn sup_f_scan(data: &DerivedData, target: Target, opts: &ModelOptions) -> Result<BreakScan, AppError> {
    validate_trim(opts.trim)?;
    let problem = BreakProblem::new(data, target, opts)?;
    scan_from_problem(&problem, target, opts.trim)
}

fn validate_trim(trim: f64) -> Result<(), AppError> {
    if trim > 0.0 && trim < 0.5 {
        Ok(())
    } else {
        Err(AppError::input(format!("Trim fraction must be in (0, 0.5), got {trim}.")))
    }
}

fn scan_from_problem(
    problem: &BreakProblem,
    target: Target,
    trim: f64,
) -> Result<BreakScan, AppError> {
    let (lo, hi) = candidate_range(problem.n, problem.k, trim).ok_or_else(|| {
        AppError::data(format!(
            "Sample too short for a sup-F scan (n={}, trim={trim}).",
            problem.n
        ))
    })?;

    // Evaluate each candidate independently (parallel); order is restored by index.
    let path: Vec<(usize, f64)> = (lo..=hi)
        .into_par_iter()
        .map(|b| problem.chow_f(b).map(|(f, _, _)| (b, f)))
        .collect::<Result<_, _>>()?;

    // Deterministic selection: maximum F; ties go to the earliest date.
    let mut best = path[0];
    for &(b, f) in &path[1..] {
        if f > best.1 {
            best = (b, f);
        }
    }

    Ok(BreakScan {
        target,
        trim,
        sup_f: best.1,
        break_index: best.0,
        break_date: problem.dates[best.0],
        nominal_p_value: problem.p_value(best.1)?,
        path: path.iter().map(|&(b, f)| (problem.dates[b], f)).collect(),
    })
}

/// Run the Chow test at the policy date and the sup-F scan for one target.
///
/// A test that cannot run (too few observations on one side) is recorded in
/// `skipped` instead of failing the whole analysis.
pub fn run_break_tests(data: &DerivedData, target: Target, opts: &ModelOptions) -> Result<BreakTests, AppError> {
    validate_trim(opts.trim)?;
    let problem = BreakProblem::new(data, target, opts)?;
    let mut skipped = Vec::new();

    let chow = match problem.policy_index(data.policy_date) {
        Some(idx) => match chow_from_problem(&problem, target, idx) {
            Ok(c) => Some(c),
            Err(e) => {
                skipped.push(format!("Chow at policy date: {e}"));
                None
            }
        },
        None => {
            skipped.push("Chow at policy date: policy date does not split the sample.".to_string());
            None
        }
    };

    let scan = match scan_from_problem(&problem, target, opts.trim) {
        Ok(s) => Some(s),
        Err(e) => {
            skipped.push(format!("sup-F scan: {e}"));
            None
        }
    };

    for reason in &skipped {
        warn!(target = target.short_name(), reason = %reason, "break test skipped");
    }
    info!(
        target = target.short_name(),
        chow_f = chow.as_ref().map(|c| c.f_stat),
        sup_f = scan.as_ref().map(|s| s.sup_f),
        estimated_break = scan.as_ref().map(|s| s.break_date.to_string()),
        "break tests done"
    );

    Ok(BreakTests {
        target,
        chow,
        scan,
        skipped,
    })
}
