//! ASCII plotting for terminal output.
//!
//! Fixed-size grid, deterministic output (helpful for golden tests).
//!
//! Plot elements:
//! - observed values: `o`
//! - fitted intervention model: `-` line
//! - policy date: `|` column

use crate::domain::Transform;
use crate::fit::regression::InterventionFit;
use crate::models::{DerivedData, Series};

/// Observed series over time with the policy column.
pub fn render_series_plot(data: &DerivedData, series: Series, width: usize, height: usize) -> String {
    render_plot(data, series.display_name(), &data.series(series), None, width, height)
}

/// Observed target price plus the fitted intervention model, in price units.
pub fn render_fit_plot(data: &DerivedData, fit: &InterventionFit, width: usize, height: usize) -> String {
    let observed = data.column(|r| r.target(fit.target));
    // Spread fitted values back over all rows; rows the model skipped stay blank.
    let aligned = fit.rows.len() == fit.ols.fitted.len() && fit.rows.iter().all(|&i| i < observed.len());
    let fitted = aligned.then(|| {
        let mut full = vec![f64::NAN; observed.len()];
        for (&i, &v) in fit.rows.iter().zip(&fit.ols.fitted) {
            full[i] = match fit.transform {
                Transform::Level => v,
                Transform::Log => v.exp(),
            };
        }
        full
    });
    render_plot(data, fit.target.display_name(), &observed, fitted.as_deref(), width, height)
}

fn render_plot(
    data: &DerivedData,
    title: &str,
    observed: &[f64],
    fitted: Option<&[f64]>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let n = observed.len();

    let (y_min, y_max) = y_range(observed, fitted).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Fitted line first, then the policy column into blanks, then points on top.
    if let Some(fitted) = fitted {
        let mut prev = None;
        for (i, &y) in fitted.iter().enumerate() {
            if !y.is_finite() {
                continue;
            }
            let x = map_x(i, n, width);
            let yy = map_y(y, y_min, y_max, height);
            match prev {
                Some((x0, y0)) => draw_line(&mut grid, x0, y0, x, yy, '-'),
                None => grid[yy][x] = '-',
            }
            prev = Some((x, yy));
        }
    }

    if let Some(idx) = data.policy_break_index() {
        let x = map_x(idx, n, width);
        for row in grid.iter_mut() {
            if row[x] == ' ' {
                row[x] = '|';
            }
        }
    }

    for (i, &y) in observed.iter().enumerate() {
        if y.is_finite() {
            grid[map_y(y, y_min, y_max, height)][map_x(i, n, width)] = 'o';
        }
    }

    let mut out = String::new();
    let span = match (data.rows.first(), data.rows.last()) {
        (Some(a), Some(b)) => format!("{}..{}", a.date, b.date),
        _ => "empty".to_string(),
    };
    out.push_str(&format!("Plot: {title} | {span} | y=[{y_min:.2}, {y_max:.2}]\n"));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn y_range(observed: &[f64], fitted: Option<&[f64]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &y in observed.iter().chain(fitted.unwrap_or(&[])) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n < 2 {
        return 0;
    }
    let u = (i as f64 / (n as f64 - 1.0)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish); only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, generate_sample};
    use crate::domain::{Observation, Target};
    use crate::fit::{ModelOptions, regression::fit_intervention};
    use crate::models::derive;
    use chrono::NaiveDate;

    #[test]
    fn plot_golden_snapshot_small() {
        let d = |m| NaiveDate::from_ymd_opt(2023, m, 1).unwrap();
        let obs: Vec<Observation> = (1..=4)
            .map(|m| Observation {
                date: d(m),
                diesel: m as f64,
                gasoline: 3.0,
                brent_usd: 80.0,
                fx: 5.0,
            })
            .collect();
        let data = derive(&obs, d(3));

        let txt = render_series_plot(&data, Series::Diesel, 10, 5);
        let expected = concat!(
            "Plot: Diesel S10 (R$/L) | 2023-01-01..2023-04-01 | y=[0.85, 4.15]\n",
            "      |  o\n",
            "      o   \n",
            "      |   \n",
            "   o  |   \n",
            "o     |   \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn fit_plot_overlays_model_line() {
        let config = SampleConfig::default();
        let data = derive(&generate_sample(&config).unwrap(), config.policy_date);
        let fit = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap();

        let txt = render_fit_plot(&data, &fit, 60, 15);
        assert!(txt.starts_with("Plot: Diesel S10 (R$/L)"));
        assert_eq!(txt.lines().count(), 16);
        assert!(txt.contains('o'));
        assert!(txt.contains('|'));
        assert!(txt.contains('-'));
    }

    #[test]
    fn fit_plot_with_missing_price_keeps_model_line() {
        let config = SampleConfig::default();
        let mut obs = generate_sample(&config).unwrap();
        obs[5].diesel = f64::NAN;
        let data = derive(&obs, config.policy_date);
        let fit = fit_intervention(&data, Target::Diesel, &ModelOptions::default()).unwrap();
        assert_eq!(fit.rows.len(), data.len() - 1);

        let txt = render_fit_plot(&data, &fit, 60, 15);
        assert!(txt.contains('-'));
        assert!(txt.contains('o'));
    }
}
