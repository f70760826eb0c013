//! Intervention regressions.
//!
//! One model per fuel:
//!
//! ```text
//! y = b0 + b1·time + b2·post + b3·time_post + b4·brent_brl + b5·fx + e
//! ```
//!
//! `b2` is the level shift at the policy date and `b3` the change in trend.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Regime, Target, Transform};
use crate::error::AppError;
use crate::fit::ModelOptions;
use crate::math::{Coefficient, OlsFit, fit_ols};
use crate::models::{DerivedData, INTERVENTION_REGRESSORS, Regressor, build_design, regressor_labels};

/// Fit output for one fuel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionFit {
    pub target: Target,
    pub transform: Transform,
    pub n_pre: usize,
    pub n_post: usize,
    pub ols: OlsFit,
    /// Indices into `DerivedData::rows` of the rows the model used.
    #[serde(skip)]
    pub rows: Vec<usize>,
}

impl InterventionFit {
    /// Coefficient on the intervention dummy.
    pub fn level_shift(&self) -> Option<&Coefficient> {
        self.ols.coefficients.get(regressor_slot(Regressor::Post))
    }

    /// Coefficient on `time × post`.
    pub fn trend_change(&self) -> Option<&Coefficient> {
        self.ols.coefficients.get(regressor_slot(Regressor::TimePost))
    }

    pub fn pre_trend(&self) -> Option<f64> {
        self.ols
            .coefficients
            .get(regressor_slot(Regressor::Time))
            .map(|c| c.estimate)
    }

    /// Trend after the policy date (`b1 + b3`).
    pub fn post_trend(&self) -> Option<f64> {
        Some(self.pre_trend()? + self.trend_change()?.estimate)
    }
}

fn regressor_slot(reg: Regressor) -> usize {
    INTERVENTION_REGRESSORS
        .iter()
        .position(|r| *r == reg)
        .unwrap_or(usize::MAX)
}

/// Fit the intervention model for one target.
pub fn fit_intervention(
    data: &DerivedData,
    target: Target,
    opts: &ModelOptions,
) -> Result<InterventionFit, AppError> {
    let design = build_design(&data.rows, &INTERVENTION_REGRESSORS, target, opts.transform)?;
    let n_post = design
        .rows
        .iter()
        .filter(|&&i| data.rows[i].regime == Regime::Post)
        .count();
    let n_pre = design.n() - n_post;
    if n_pre == 0 || n_post == 0 {
        return Err(AppError::data(format!(
            "Policy date {} does not split the {} sample (the intervention dummy is constant); \
             both regimes need complete observations.",
            data.policy_date,
            target.short_name()
        )));
    }
    if design.n() < data.len() {
        debug!(
            target = target.short_name(),
            dropped = data.len() - design.n(),
            "incomplete rows left out of the intervention model"
        );
    }

    let labels = regressor_labels(&INTERVENTION_REGRESSORS, opts.transform);
    let names: Vec<&str> = labels.iter().map(String::as_str).collect();

    let ols = fit_ols(&design.x, &design.y, &names, &opts.ols())
        .map_err(|e| AppError::new(e.exit_code(), format!("{} model: {e}", target.short_name())))?;

    let fit = InterventionFit {
        target,
        transform: opts.transform,
        n_pre,
        n_post,
        ols,
        rows: design.rows,
    };

    info!(
        target = target.short_name(),
        n = fit.ols.n,
        adj_r2 = fit.ols.adj_r_squared,
        level_shift = fit.level_shift().map(|c| c.estimate),
        trend_change = fit.trend_change().map(|c| c.estimate),
        "fitted intervention model"
    );

    Ok(fit)
}

/// Fit every target in report order (gasoline, then diesel).
pub fn fit_all(data: &DerivedData, opts: &ModelOptions) -> Result<Vec<InterventionFit>, AppError> {
    Target::ALL
        .iter()
        .map(|&target| fit_intervention(data, target, opts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, generate_sample};
    use crate::domain::CovKind;
    use crate::models::derive;

    fn synthetic(shift: f64, seed: u64) -> DerivedData {
        let config = SampleConfig {
            shift,
            seed,
            ..SampleConfig::default()
        };
        let obs = generate_sample(&config).unwrap();
        derive(&obs, config.policy_date)
    }

    #[test]
    fn injected_level_shift_is_significant() {
        let data = synthetic(0.8, 7);
        let fit = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap();

        let shift = fit.level_shift().unwrap();
        assert_eq!(shift.name, "post");
        assert!(shift.estimate > 0.0, "estimate={}", shift.estimate);
        assert!(shift.is_significant(0.01), "p={}", shift.p_value);
        assert!((shift.estimate - 0.8).abs() < 4.0 * shift.std_err);
        assert!(shift.ci_low > 0.0);
    }

    #[test]
    fn no_shift_is_not_significant() {
        let data = synthetic(0.0, 11);
        let fit = fit_intervention(&data, Target::Gasoline, &ModelOptions::default()).unwrap();
        let shift = fit.level_shift().unwrap();
        assert!(!shift.is_significant(0.01), "p={}", shift.p_value);
    }

    #[test]
    fn hac_changes_errors_not_estimates() {
        let data = synthetic(0.5, 3);
        let plain = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap();
        let hac = fit_intervention(
            &data,
            Target::Diesel,
            &ModelOptions {
                cov: CovKind::Hac,
                ..ModelOptions::default()
            },
        )
        .unwrap();

        for (a, b) in plain.ols.coefficients.iter().zip(&hac.ols.coefficients) {
            assert!((a.estimate - b.estimate).abs() < 1e-9);
        }
        assert!(hac.ols.hac_lags.is_some());
    }

    #[test]
    fn fit_all_returns_gasoline_then_diesel() {
        let data = synthetic(0.3, 5);
        let fits = fit_all(&data, &ModelOptions::default()).unwrap();
        let targets: Vec<Target> = fits.iter().map(|f| f.target).collect();
        assert_eq!(targets, vec![Target::Gasoline, Target::Diesel]);
        assert_eq!(fits[0].n_pre + fits[0].n_post, data.len());
        assert!(fits[0].post_trend().is_some());
    }

    #[test]
    fn policy_date_outside_sample_is_rejected() {
        let obs = generate_sample(&SampleConfig::default()).unwrap();
        let after_last = obs.last().unwrap().date.succ_opt().unwrap();
        let data = derive(&obs, after_last);
        let err = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_price_drops_only_that_row_from_its_model() {
        let mut obs = generate_sample(&SampleConfig::default()).unwrap();
        obs[10].diesel = f64::NAN;
        let data = derive(&obs, SampleConfig::default().policy_date);

        let diesel = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap();
        let gasoline = fit_intervention(&data, Target::Gasoline, &ModelOptions::default()).unwrap();
        assert_eq!(diesel.ols.n, data.len() - 1);
        assert!(!diesel.rows.contains(&10));
        assert_eq!(diesel.n_pre + diesel.n_post, data.len() - 1);
        assert_eq!(gasoline.ols.n, data.len());
    }
}
