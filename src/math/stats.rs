//! Descriptive statistics for the thesis tables and figures.
//!
//! Missing values are `NaN` and are skipped: per series for the univariate
//! statistics, per pair for correlations.
//!
//! Degenerate inputs (empty slices, a single value, zero variance) return `NaN`
//! instead of panicking; the table renderer prints those as `-`.

fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean of the present values.
pub fn mean(values: &[f64]) -> f64 {
    let v = present(values);
    if v.is_empty() {
        return f64::NAN;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Sample standard deviation (`ddof = 1`) of the present values.
pub fn std_dev(values: &[f64]) -> f64 {
    let v = present(values);
    if v.len() < 2 {
        return f64::NAN;
    }
    let m = mean(&v);
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (v.len() as f64 - 1.0);
    var.sqrt()
}

/// Pearson correlation over the positions where both series are present.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::NAN;
    }
    let (a, b): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    if a.len() < 2 {
        return f64::NAN;
    }
    let ma = mean(&a);
    let mb = mean(&b);
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(&b) {
        sab += (x - ma) * (y - mb);
        saa += (x - ma).powi(2);
        sbb += (y - mb).powi(2);
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return f64::NAN;
    }
    (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
}

/// Minimum and maximum of the finite values.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_finite() && hi.is_finite() { Some((lo, hi)) } else { None }
}

/// Rescale to `[0, 1]` via `(v - min) / (max - min)`.
///
/// A constant series maps to all zeros; missing values stay missing.
pub fn normalize_min_max(values: &[f64]) -> Vec<f64> {
    let Some((lo, hi)) = min_max(values) else {
        return vec![f64::NAN; values.len()];
    };
    let range = hi - lo;
    values
        .iter()
        .map(|&v| match v {
            v if !v.is_finite() => f64::NAN,
            v if range > 0.0 => (v - lo) / range,
            _ => 0.0,
        })
        .collect()
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `[min, q1, median, q3, max]`.
pub fn five_number_summary(values: &[f64]) -> Option<[f64; 5]> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    Some([
        sorted[0],
        quantile(&sorted, 0.25),
        quantile(&sorted, 0.5),
        quantile(&sorted, 0.75),
        sorted[sorted.len() - 1],
    ])
}

/// Box-plot geometry with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within `q1 - 1.5·IQR`.
    pub whisker_low: f64,
    /// Largest value within `q3 + 1.5·IQR`.
    pub whisker_high: f64,
    /// Values beyond the fences, ascending.
    pub outliers: Vec<f64>,
}

/// Quartiles, whiskers at the most extreme values inside the 1.5·IQR fences,
/// and the points outside them.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted = present(values);
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    let (inside, outliers): (Vec<f64>, Vec<f64>) =
        sorted.iter().partition(|&&v| v >= lo_fence && v <= hi_fence);
    // q1 and q3 always lie between the fences, so `inside` is never empty
    let whisker_low = inside.first().copied().unwrap_or(q1);
    let whisker_high = inside.last().copied().unwrap_or(q3);

    Some(BoxStats {
        q1,
        median,
        q3,
        whisker_low,
        whisker_high,
        outliers,
    })
}

/// Median of integer spacings (lower median for even lengths).
pub fn median_i64(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn std_dev_uses_sample_denominator() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Population sd is 2; sample sd is sqrt(32/7).
        assert!((std_dev(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!(std_dev(&[1.0]).is_nan());
    }

    #[test]
    fn pearson_of_linear_relationship_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [10.0, 20.0, 30.0, 40.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
        let c = [4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-12);
        assert!(pearson(&a, &[1.0, 1.0, 1.0, 1.0]).is_nan());
    }

    #[test]
    fn normalize_constant_series_is_zero() {
        assert_eq!(normalize_min_max(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_values_are_skipped() {
        let v = [1.0, f64::NAN, 3.0];
        assert_eq!(mean(&v), 2.0);
        assert!((std_dev(&v) - 2.0_f64.sqrt()).abs() < 1e-12);

        let n = normalize_min_max(&v);
        assert_eq!(n[0], 0.0);
        assert!(n[1].is_nan());
        assert_eq!(n[2], 1.0);
    }

    #[test]
    fn pearson_uses_pairwise_complete_values() {
        let a = [1.0, 2.0, f64::NAN, 4.0, 5.0];
        let b = [2.0, 4.0, 100.0, 8.0, f64::NAN];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, f64::NAN], &[f64::NAN, 2.0]).is_nan());
    }

    #[test]
    fn box_whiskers_stop_at_last_point_inside_fences() {
        // q1 = 2.5, q3 = 7.5, IQR = 5, fences at -5 and 15
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 30.0, -20.0];
        let b = box_stats(&v).unwrap();
        assert_eq!((b.q1, b.median, b.q3), (2.5, 5.0, 7.5));
        assert_eq!(b.whisker_low, 1.0);
        assert_eq!(b.whisker_high, 9.0);
        assert_eq!(b.outliers, vec![-20.0, 30.0]);

        let tight = box_stats(&[2.0, 3.0, 4.0]).unwrap();
        assert_eq!((tight.whisker_low, tight.whisker_high), (2.0, 4.0));
        assert!(tight.outliers.is_empty());
        assert!(box_stats(&[f64::NAN]).is_none());
    }

    #[test]
    fn five_number_summary_interpolates() {
        let s = five_number_summary(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(s, [1.0, 2.0, 3.0, 4.0, 5.0]);
        let s = five_number_summary(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((s[1] - 1.75).abs() < 1e-12);
        assert!((s[2] - 2.5).abs() < 1e-12);
        assert!(five_number_summary(&[]).is_none());
    }

    #[test]
    fn median_of_spacings() {
        assert_eq!(median_i64(&[31, 28, 31, 30]), Some(30));
        assert_eq!(median_i64(&[]), None);
    }

    proptest! {
        #[test]
        fn normalized_values_stay_in_unit_interval(values in prop::collection::vec(-1e6f64..1e6, 1..64)) {
            for v in normalize_min_max(&values) {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }

        #[test]
        fn correlation_is_bounded(
            pairs in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 3..64)
        ) {
            let (a, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let r = pearson(&a, &b);
            prop_assert!(r.is_nan() || (-1.0..=1.0).contains(&r));
        }

        #[test]
        fn quartiles_are_ordered(values in prop::collection::vec(-1e6f64..1e6, 1..64)) {
            let s = five_number_summary(&values).unwrap();
            prop_assert!(s.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
