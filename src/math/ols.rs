//! Ordinary least squares with classical and robust inference.
//!
//! Every model in this project is a small linear regression:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - β is solved with SVD so that tall design matrices (more rows than columns)
//!   are handled robustly. (Nalgebra's `QR::solve` is intended for square systems.)
//! - `(X'X)⁻¹` is taken from the same decomposition as `X⁺ (X⁺)ᵀ`.
//! - A rank check runs before anything else: an intervention dummy that is
//!   constant over the sample makes the design singular, and the caller must hear
//!   about it rather than get a minimum-norm answer.
//! - The first column is assumed to be the intercept. The overall F test covers
//!   every other column.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::domain::CovKind;
use crate::error::AppError;

/// Singular values below `RANK_TOL * max` mean the design is rank-deficient.
const RANK_TOL: f64 = 1e-10;

/// Two-sided confidence level of the reported intervals.
const CI_LEVEL: f64 = 0.95;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Default Newey–West truncation lag: `floor(4 (n/100)^(2/9))`.
pub fn default_hac_lags(n: usize) -> usize {
    (4.0 * (n as f64 / 100.0).powf(2.0 / 9.0)).floor() as usize
}

/// Options controlling inference (not the point estimates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsOptions {
    pub cov: CovKind,
    /// Newey–West lags; `None` uses [`default_hac_lags`]. Ignored unless `cov = Hac`.
    pub hac_lags: Option<usize>,
}

impl Default for OlsOptions {
    fn default() -> Self {
        Self {
            cov: CovKind::Nonrobust,
            hac_lags: None,
        }
    }
}

/// One row of a coefficient table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub estimate: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub std_err: f64,
    /// t statistic (z statistic under robust covariance).
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub t_stat: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub p_value: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub ci_low: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub ci_high: f64,
}

impl Coefficient {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value.is_finite() && self.p_value < alpha
    }
}

/// A fitted regression with its diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsFit {
    pub coefficients: Vec<Coefficient>,
    pub cov: CovKind,
    /// Lags actually used for HAC (`None` for other covariance kinds).
    pub hac_lags: Option<usize>,
    pub n: usize,
    pub k: usize,
    pub df_resid: usize,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub sse: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub r_squared: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub adj_r_squared: f64,
    /// Wald F statistic for "all slopes are zero".
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub f_stat: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub f_p_value: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub log_likelihood: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub aic: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub bic: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub durbin_watson: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub jarque_bera: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub jb_p_value: f64,
    #[serde(deserialize_with = "crate::math::nullable::f64_or_nan")]
    pub condition_number: f64,
    #[serde(skip)]
    pub fitted: Vec<f64>,
    #[serde(skip)]
    pub residuals: Vec<f64>,
}

impl OlsFit {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn estimate(&self, name: &str) -> Option<f64> {
        self.coefficient(name).map(|c| c.estimate)
    }
}

/// Reference distribution for coefficient tests.
enum Reference {
    T(StudentsT),
    Z(Normal),
}

impl Reference {
    fn new(cov: CovKind, df: usize) -> Result<Self, AppError> {
        match cov {
            CovKind::Nonrobust => StudentsT::new(0.0, 1.0, df as f64)
                .map(Reference::T)
                .map_err(|e| AppError::numeric(format!("Failed to create t-distribution: {e}"))),
            CovKind::Hc1 | CovKind::Hac => Normal::new(0.0, 1.0)
                .map(Reference::Z)
                .map_err(|e| AppError::numeric(format!("Failed to create normal distribution: {e}"))),
        }
    }

    fn two_sided_p(&self, stat: f64) -> f64 {
        if !stat.is_finite() {
            return if stat.is_nan() { f64::NAN } else { 0.0 };
        }
        let tail = match self {
            Reference::T(d) => 1.0 - d.cdf(stat.abs()),
            Reference::Z(d) => 1.0 - d.cdf(stat.abs()),
        };
        (2.0 * tail).clamp(0.0, 1.0)
    }

    fn critical(&self, level: f64) -> f64 {
        let q = 1.0 - (1.0 - level) / 2.0;
        match self {
            Reference::T(d) => d.inverse_cdf(q),
            Reference::Z(d) => d.inverse_cdf(q),
        }
    }
}

/// Fit `y = Xβ + e` and compute coefficient inference and model diagnostics.
///
/// `names` labels the columns of `x` (first column: intercept).
pub fn fit_ols(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    names: &[&str],
    opts: &OlsOptions,
) -> Result<OlsFit, AppError> {
    let n = x.nrows();
    let k = x.ncols();

    if names.len() != k {
        return Err(AppError::numeric(format!(
            "Design has {k} columns but {} names were supplied.",
            names.len()
        )));
    }
    if y.len() != n {
        return Err(AppError::numeric(format!(
            "Design has {n} rows but the response has {} values.",
            y.len()
        )));
    }
    if k == 0 || n <= k {
        return Err(AppError::data(format!(
            "Not enough observations to fit {k} coefficients (n={n})."
        )));
    }
    if !(x.iter().all(|v| v.is_finite()) && y.iter().all(|v| v.is_finite())) {
        return Err(AppError::numeric("Non-finite values in regression inputs."));
    }

    let svd = x.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min <= RANK_TOL * s_max {
        let constant = constant_columns(x, names);
        let hint = if constant.is_empty() {
            String::new()
        } else {
            format!(" Constant regressors: {}.", constant.join(", "))
        };
        return Err(AppError::numeric(format!(
            "Design matrix is rank-deficient (collinear regressors).{hint}"
        )));
    }
    let condition_number = s_max / s_min;

    let beta = solve_least_squares(x, y)
        .ok_or_else(|| AppError::numeric("Least squares solve failed (ill-conditioned design)."))?;
    let pinv = svd
        .pseudo_inverse(RANK_TOL * s_max)
        .map_err(|e| AppError::numeric(format!("Pseudo-inverse failed: {e}")))?;
    let xtx_inv = &pinv * pinv.transpose();

    let fitted = x * &beta;
    let resid = y - &fitted;
    let sse = resid.norm_squared();
    let df_resid = n - k;

    let (cov, hac_lags) = covariance(x, &resid, &xtx_inv, sse, opts);
    let reference = Reference::new(opts.cov, df_resid)?;
    let crit = reference.critical(CI_LEVEL);

    let coefficients = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_err = cov[(j, j)].max(0.0).sqrt();
            let t_stat = estimate / std_err;
            Coefficient {
                name: (*name).to_string(),
                estimate,
                std_err,
                t_stat,
                p_value: reference.two_sided_p(t_stat),
                ci_low: estimate - crit * std_err,
                ci_high: estimate + crit * std_err,
            }
        })
        .collect();

    let y_mean = y.mean();
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - sse / tss } else { f64::NAN };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid as f64;

    let (f_stat, f_p_value) = slope_wald_f(&beta, &cov, df_resid)?;

    let nf = n as f64;
    let log_likelihood = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (sse / nf).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;
    let bic = -2.0 * log_likelihood + k as f64 * nf.ln();

    let residuals: Vec<f64> = resid.iter().copied().collect();
    let durbin_watson = durbin_watson(&residuals);
    let (jarque_bera, jb_p_value) = jarque_bera(&residuals)?;

    Ok(OlsFit {
        coefficients,
        cov: opts.cov,
        hac_lags,
        n,
        k,
        df_resid,
        sse,
        r_squared,
        adj_r_squared,
        f_stat,
        f_p_value,
        log_likelihood,
        aic,
        bic,
        durbin_watson,
        jarque_bera,
        jb_p_value,
        condition_number,
        fitted: fitted.iter().copied().collect(),
        residuals,
    })
}

/// Durbin–Watson statistic `Σ (e_t - e_{t-1})² / Σ e_t²`.
pub fn durbin_watson(residuals: &[f64]) -> f64 {
    let denom: f64 = residuals.iter().map(|e| e * e).sum();
    let numer: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    numer / denom
}

/// Jarque–Bera normality test on residuals; returns `(statistic, p-value)`.
pub fn jarque_bera(residuals: &[f64]) -> Result<(f64, f64), AppError> {
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let m2 = residuals.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    let m3 = residuals.iter().map(|e| (e - mean).powi(3)).sum::<f64>() / n;
    let m4 = residuals.iter().map(|e| (e - mean).powi(4)).sum::<f64>() / n;

    let skew = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2);
    let jb = n / 6.0 * (skew * skew + (kurtosis - 3.0).powi(2) / 4.0);

    let chi2 = ChiSquared::new(2.0)
        .map_err(|e| AppError::numeric(format!("Failed to create chi-squared distribution: {e}")))?;
    let p = if jb.is_finite() { 1.0 - chi2.cdf(jb) } else { f64::NAN };
    Ok((jb, p))
}

fn covariance(
    x: &DMatrix<f64>,
    resid: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    sse: f64,
    opts: &OlsOptions,
) -> (DMatrix<f64>, Option<usize>) {
    let n = x.nrows();
    let k = x.ncols();
    let df = (n - k) as f64;

    match opts.cov {
        CovKind::Nonrobust => (xtx_inv * (sse / df), None),
        CovKind::Hc1 => {
            let meat = hac_meat(x, resid, 0);
            (xtx_inv * meat * xtx_inv * (n as f64 / df), None)
        }
        CovKind::Hac => {
            let lags = opts.hac_lags.unwrap_or_else(|| default_hac_lags(n)).min(n - 1);
            let meat = hac_meat(x, resid, lags);
            (xtx_inv * meat * xtx_inv * (n as f64 / df), Some(lags))
        }
    }
}

/// `Γ₀ + Σ_{l=1}^{L} (1 - l/(L+1)) (Γ_l + Γ_lᵀ)` with `Γ_l = Σ_t e_t e_{t-l} x_t x_{t-l}ᵀ`.
fn hac_meat(x: &DMatrix<f64>, resid: &DVector<f64>, lags: usize) -> DMatrix<f64> {
    let n = x.nrows();
    let k = x.ncols();
    let u = DMatrix::from_fn(n, k, |i, j| x[(i, j)] * resid[i]);

    let mut meat = u.transpose() * &u;
    for l in 1..=lags {
        let weight = 1.0 - l as f64 / (lags as f64 + 1.0);
        let gamma = u.rows(l, n - l).transpose() * u.rows(0, n - l);
        meat += (&gamma + gamma.transpose()) * weight;
    }
    meat
}

fn slope_wald_f(beta: &DVector<f64>, cov: &DMatrix<f64>, df_resid: usize) -> Result<(f64, f64), AppError> {
    let q = beta.len() - 1;
    if q == 0 {
        return Ok((f64::NAN, f64::NAN));
    }

    let b = beta.rows(1, q).into_owned();
    let v = cov.view((1, 1), (q, q)).into_owned();
    let Some(v_inv) = v.try_inverse() else {
        return Ok((f64::NAN, f64::NAN));
    };

    let wald = (b.transpose() * v_inv * &b)[(0, 0)];
    let f = wald / q as f64;

    let dist = FisherSnedecor::new(q as f64, df_resid as f64)
        .map_err(|e| AppError::numeric(format!("Failed to create F distribution: {e}")))?;
    let p = if f.is_finite() { 1.0 - dist.cdf(f) } else { f64::NAN };
    Ok((f, p))
}

fn constant_columns(x: &DMatrix<f64>, names: &[&str]) -> Vec<String> {
    // Column 0 is the intercept and constant by construction.
    (1..x.ncols())
        .filter(|&j| {
            let col = x.column(j);
            let first = col[0];
            col.iter().all(|v| (v - first).abs() < 1e-12)
        })
        .map(|j| names[j].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    fn simple_design(xs: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(xs.len(), 2, |i, j| if j == 0 { 1.0 } else { xs[i] })
    }

    #[test]
    fn simple_regression_matches_closed_form() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ys = [2.1, 3.9, 6.2, 7.8, 10.1, 12.2];
        let x = simple_design(&xs);
        let y = DVector::from_row_slice(&ys);

        let fit = fit_ols(&x, &y, &["const", "x"], &OlsOptions::default()).unwrap();

        // Closed-form simple regression.
        let n = xs.len() as f64;
        let mx = xs.iter().sum::<f64>() / n;
        let my = ys.iter().sum::<f64>() / n;
        let sxx: f64 = xs.iter().map(|v| (v - mx).powi(2)).sum();
        let sxy: f64 = xs.iter().zip(&ys).map(|(a, b)| (a - mx) * (b - my)).sum();
        let slope = sxy / sxx;
        let intercept = my - slope * mx;
        let sse: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(a, b)| (b - intercept - slope * a).powi(2))
            .sum();
        let se_slope = (sse / (n - 2.0) / sxx).sqrt();

        let b = fit.coefficient("x").unwrap();
        assert!((b.estimate - slope).abs() < 1e-10);
        assert!((b.std_err - se_slope).abs() < 1e-10);
        assert!((fit.estimate("const").unwrap() - intercept).abs() < 1e-10);
        assert!((fit.sse - sse).abs() < 1e-10);
        assert_eq!(fit.df_resid, 4);

        // With one slope, the overall F equals t².
        assert!((fit.f_stat - b.t_stat * b.t_stat).abs() < 1e-6);
        assert!(b.ci_low < b.estimate && b.estimate < b.ci_high);
        assert!(b.p_value < 1e-4);
    }

    #[test]
    fn adjusted_r_squared_is_below_r_squared() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let ys = [1.0, 2.5, 2.9, 4.2, 5.1, 5.8, 7.3, 7.9];
        let fit = fit_ols(
            &simple_design(&xs),
            &DVector::from_row_slice(&ys),
            &["const", "x"],
            &OlsOptions::default(),
        )
        .unwrap();
        assert!(fit.r_squared > 0.9);
        assert!(fit.adj_r_squared < fit.r_squared);
        assert!(fit.aic.is_finite() && fit.bic.is_finite());
        assert!(fit.durbin_watson > 0.0 && fit.durbin_watson < 4.0);
    }

    #[test]
    fn hac_with_zero_lags_equals_hc1() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let ys = [1.2, 1.9, 3.4, 3.8, 5.6, 5.9, 7.7, 7.6, 9.8, 9.9];
        let x = simple_design(&xs);
        let y = DVector::from_row_slice(&ys);

        let hc1 = fit_ols(&x, &y, &["const", "x"], &OlsOptions { cov: CovKind::Hc1, hac_lags: None }).unwrap();
        let hac0 = fit_ols(&x, &y, &["const", "x"], &OlsOptions { cov: CovKind::Hac, hac_lags: Some(0) }).unwrap();

        for (a, b) in hc1.coefficients.iter().zip(&hac0.coefficients) {
            assert!((a.std_err - b.std_err).abs() < 1e-12);
            assert!((a.estimate - b.estimate).abs() < 1e-12);
        }
        assert_eq!(hac0.hac_lags, Some(0));
        assert_eq!(hc1.hac_lags, None);
    }

    #[test]
    fn rank_deficient_design_is_rejected_with_column_name() {
        // Third column is constant, so it duplicates the intercept.
        let x = DMatrix::from_fn(6, 3, |i, j| match j {
            0 => 1.0,
            1 => i as f64,
            _ => 1.0,
        });
        let y = DVector::from_fn(6, |i, _| i as f64 * 2.0 + 1.0);

        let err = fit_ols(&x, &y, &["const", "time", "post"], &OlsOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("post"), "{err}");
    }

    #[test]
    fn too_few_rows_is_a_data_error() {
        let x = simple_design(&[1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        let err = fit_ols(&x, &y, &["const", "x"], &OlsOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn default_lags_follow_newey_west_rule() {
        assert_eq!(default_hac_lags(100), 4);
        assert_eq!(default_hac_lags(50), 3);
    }
}
