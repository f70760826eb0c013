//! SVG figures rendered with Plotters.
//!
//! 1. levels of every series (Brent on a secondary axis)
//! 2. min–max normalised series
//! 3. diesel price by regime (box plot)
//! 4. gasoline price by regime (box plot)
//!
//! Box plots use Tukey whiskers: each whisker ends at the most extreme value
//! within 1.5·IQR of the box, and values beyond are drawn as circles.
//!
//! Every figure marks the policy date with a dashed vertical line (or, for the
//! box plots, splits the sample on it). The x axis of the time-series figures
//! is the `time` index; tick labels map it back to `YYYY-MM`.

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;

use crate::domain::{Regime, Target};
use crate::error::AppError;
use crate::math::{BoxStats, box_stats, min_max, normalize_min_max};
use crate::models::{DerivedData, Series};

const LINE_FIGURE_SIZE: (u32, u32) = (960, 540);
const BOX_FIGURE_SIZE: (u32, u32) = (640, 480);
const FONT: &str = "sans-serif";

const DIESEL_COLOR: RGBColor = RGBColor(200, 40, 40);
const GASOLINE_COLOR: RGBColor = RGBColor(30, 90, 200);
const BRENT_COLOR: RGBColor = RGBColor(40, 140, 60);
const FX_COLOR: RGBColor = RGBColor(220, 140, 0);

fn series_color(series: Series) -> RGBColor {
    match series {
        Series::Diesel => DIESEL_COLOR,
        Series::Gasoline => GASOLINE_COLOR,
        Series::BrentBrl => BRENT_COLOR,
        Series::Fx => FX_COLOR,
    }
}

/// A rendered figure ready to be written to disk.
#[derive(Debug, Clone)]
pub struct Figure {
    /// File name inside the output directory.
    pub file_name: String,
    pub svg: String,
}

fn render_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::numeric(format!("Failed to render figure: {e}"))
}

fn render_svg(
    size: (u32, u32),
    draw: impl FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), AppError>,
) -> Result<String, AppError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        draw(&root)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Padded `(min, max)` over several series; `(0, 1)` when nothing is finite.
fn padded_range<'a>(values: impl IntoIterator<Item = &'a [f64]>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        if let Some((a, b)) = min_max(v) {
            lo = lo.min(a);
            hi = hi.max(b);
        }
    }
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad, hi + pad)
}

/// `time` axis bounds and the policy line position.
fn time_axis(data: &DerivedData) -> (f64, f64, Option<f64>) {
    let x0 = data.rows.first().map(|r| r.time).unwrap_or(0.0);
    let x1 = data.rows.last().map(|r| r.time).unwrap_or(1.0).max(x0 + 1.0);
    let policy = data.policy_break_index().map(|i| data.rows[i].time);
    (x0, x1, policy)
}

fn date_label(data: &DerivedData, time: f64) -> String {
    let i = time.round() as i64 - 1;
    usize::try_from(i)
        .ok()
        .and_then(|i| data.rows.get(i))
        .map(|r| r.date.format("%Y-%m").to_string())
        .unwrap_or_default()
}

fn points(data: &DerivedData, values: &[f64]) -> Vec<(f64, f64)> {
    data.rows
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .map(|(r, &v)| (r.time, v))
        .collect()
}

fn policy_style() -> ShapeStyle {
    BLACK.mix(0.7).stroke_width(1)
}

/// Figure 1: diesel, gasoline and FX on the left axis, Brent (R$/bbl) on the right.
pub fn render_levels_svg(data: &DerivedData) -> Result<String, AppError> {
    let (x0, x1, policy) = time_axis(data);
    let primary = [Series::Diesel, Series::Gasoline, Series::Fx];
    let primary_values: Vec<Vec<f64>> = primary.iter().map(|&s| data.series(s)).collect();
    let brent = data.series(Series::BrentBrl);

    let (y0, y1) = padded_range(primary_values.iter().map(Vec::as_slice));
    let (b0, b1) = padded_range([brent.as_slice()]);

    render_svg(LINE_FIGURE_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Fuel prices, FX and Brent", (FONT, 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .right_y_label_area_size(64)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(render_err)?
            .set_secondary_coord(x0..x1, b0..b1);

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(8)
            .x_label_formatter(&|v: &f64| date_label(data, *v))
            .y_desc("R$/L and R$/US$")
            .label_style((FONT, 12))
            .draw()
            .map_err(render_err)?;
        chart
            .configure_secondary_axes()
            .y_desc(Series::BrentBrl.display_name())
            .label_style((FONT, 12))
            .draw()
            .map_err(render_err)?;

        for (series, values) in primary.iter().zip(&primary_values) {
            let color = series_color(*series);
            chart
                .draw_series(LineSeries::new(points(data, values), color.stroke_width(2)))
                .map_err(render_err)?
                .label(series.display_name())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .draw_secondary_series(LineSeries::new(points(data, &brent), BRENT_COLOR.stroke_width(2)))
            .map_err(render_err)?
            .label(Series::BrentBrl.display_name())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BRENT_COLOR.stroke_width(2)));

        if let Some(px) = policy {
            chart
                .draw_series(DashedLineSeries::new(vec![(px, y0), (px, y1)], 6, 4, policy_style()))
                .map_err(render_err)?
                .label(format!("Policy change ({})", data.policy_date))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], policy_style()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font((FONT, 12))
            .draw()
            .map_err(render_err)?;
        Ok(())
    })
}

/// Figure 2: every series min–max normalised to `[0, 1]`.
pub fn render_normalized_svg(data: &DerivedData) -> Result<String, AppError> {
    let (x0, x1, policy) = time_axis(data);

    render_svg(LINE_FIGURE_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Normalised series (min-max)", (FONT, 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(48)
            .build_cartesian_2d(x0..x1, -0.05..1.05)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(8)
            .x_label_formatter(&|v: &f64| date_label(data, *v))
            .y_desc("normalised level")
            .label_style((FONT, 12))
            .draw()
            .map_err(render_err)?;

        for series in Series::ALL {
            let color = series_color(series);
            let values = normalize_min_max(&data.series(series));
            chart
                .draw_series(LineSeries::new(points(data, &values), color.stroke_width(2)))
                .map_err(render_err)?
                .label(series.display_name())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        if let Some(px) = policy {
            chart
                .draw_series(DashedLineSeries::new(vec![(px, -0.05), (px, 1.05)], 6, 4, policy_style()))
                .map_err(render_err)?
                .label(format!("Policy change ({})", data.policy_date))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], policy_style()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font((FONT, 12))
            .draw()
            .map_err(render_err)?;
        Ok(())
    })
}

fn target_series(target: Target) -> Series {
    match target {
        Target::Diesel => Series::Diesel,
        Target::Gasoline => Series::Gasoline,
    }
}

/// Box geometry per regime, in `Regime::ALL` order; empty regimes are left out.
pub fn regime_boxes(data: &DerivedData, series: Series) -> Vec<(Regime, BoxStats)> {
    Regime::ALL
        .iter()
        .filter_map(|&r| box_stats(&data.regime_series(series, r)).map(|b| (r, b)))
        .collect()
}

fn regime_slot(regime: Regime) -> f64 {
    Regime::ALL.iter().position(|r| *r == regime).unwrap_or(0) as f64
}

const BOX_HALF_WIDTH: f64 = 0.2;
const CAP_HALF_WIDTH: f64 = 0.1;

/// Figures 3/4: box plot of one fuel's price before and after the policy date.
///
/// A regime without observations leaves its slot empty.
pub fn render_regime_box_svg(data: &DerivedData, target: Target) -> Result<String, AppError> {
    let series = target_series(target);
    let by_regime: Vec<Vec<f64>> = Regime::ALL
        .iter()
        .map(|&r| data.regime_series(series, r))
        .collect();
    let labels: Vec<String> = Regime::ALL.iter().map(|r| r.label(data.policy_date)).collect();
    let (y0, y1) = padded_range(by_regime.iter().map(Vec::as_slice));
    let boxes = regime_boxes(data, series);
    let color = series_color(series);

    render_svg(BOX_FIGURE_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(format!("{} by regime", target.display_name()), (FONT, 20))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(-0.5..(Regime::ALL.len() as f64 - 0.5), y0..y1)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(Regime::ALL.len() + 1)
            .x_label_formatter(&|v: &f64| {
                let slot = v.round();
                if (v - slot).abs() > 1e-6 || slot < 0.0 {
                    return String::new();
                }
                labels.get(slot as usize).cloned().unwrap_or_default()
            })
            .y_desc(target.display_name())
            .label_style((FONT, 12))
            .draw()
            .map_err(render_err)?;

        let slot_box = |r: Regime, b: &BoxStats| {
            let x = regime_slot(r);
            [(x - BOX_HALF_WIDTH, b.q3), (x + BOX_HALF_WIDTH, b.q1)]
        };
        chart
            .draw_series(boxes.iter().map(|(r, b)| Rectangle::new(slot_box(*r, b), color.mix(0.2).filled())))
            .map_err(render_err)?;
        chart
            .draw_series(boxes.iter().map(|(r, b)| Rectangle::new(slot_box(*r, b), color.stroke_width(2))))
            .map_err(render_err)?;

        let mut strokes = Vec::new();
        for (r, b) in &boxes {
            let x = regime_slot(*r);
            strokes.push(vec![(x - BOX_HALF_WIDTH, b.median), (x + BOX_HALF_WIDTH, b.median)]);
            strokes.push(vec![(x, b.q3), (x, b.whisker_high)]);
            strokes.push(vec![(x, b.q1), (x, b.whisker_low)]);
            strokes.push(vec![(x - CAP_HALF_WIDTH, b.whisker_high), (x + CAP_HALF_WIDTH, b.whisker_high)]);
            strokes.push(vec![(x - CAP_HALF_WIDTH, b.whisker_low), (x + CAP_HALF_WIDTH, b.whisker_low)]);
        }
        chart
            .draw_series(strokes.into_iter().map(|p| PathElement::new(p, color.stroke_width(2))))
            .map_err(render_err)?;

        chart
            .draw_series(boxes.iter().flat_map(|(r, b)| {
                let x = regime_slot(*r);
                b.outliers
                    .iter()
                    .map(move |&v| Circle::new((x, v), 3, color.stroke_width(1)))
            }))
            .map_err(render_err)?;
        Ok(())
    })
}

/// Every figure, in thesis order.
pub fn render_all(data: &DerivedData) -> Result<Vec<Figure>, AppError> {
    let figures = vec![
        Figure {
            file_name: "figure1_levels.svg".to_string(),
            svg: render_levels_svg(data)?,
        },
        Figure {
            file_name: "figure2_normalized.svg".to_string(),
            svg: render_normalized_svg(data)?,
        },
        Figure {
            file_name: "figure3_diesel_box.svg".to_string(),
            svg: render_regime_box_svg(data, Target::Diesel)?,
        },
        Figure {
            file_name: "figure4_gasoline_box.svg".to_string(),
            svg: render_regime_box_svg(data, Target::Gasoline)?,
        },
    ];
    debug!(count = figures.len(), "rendered figures");
    Ok(figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, generate_sample};
    use crate::models::derive;

    fn data() -> DerivedData {
        let config = SampleConfig::default();
        derive(&generate_sample(&config).unwrap(), config.policy_date)
    }

    #[test]
    fn levels_figure_has_every_series_and_policy_line() {
        let svg = render_levels_svg(&data()).unwrap();
        assert!(svg.starts_with("<svg"));
        for s in Series::ALL {
            assert!(svg.contains(s.display_name()), "missing {}", s.display_name());
        }
        assert!(svg.contains("Policy change (2023-05-01)"));
    }

    #[test]
    fn box_plot_tolerates_an_empty_regime() {
        let d = data();
        let before_start = d.rows[0].date.pred_opt().unwrap();
        let all_post = derive(
            &generate_sample(&SampleConfig::default()).unwrap(),
            before_start,
        );
        assert_eq!(all_post.regime_count(Regime::Pre), 0);

        let svg = render_regime_box_svg(&all_post, Target::Diesel).unwrap();
        assert!(svg.contains("Diesel S10 (R$/L) by regime"));
    }

    #[test]
    fn normalized_figure_labels_policy_line() {
        let svg = render_normalized_svg(&data()).unwrap();
        assert!(svg.contains("Policy change (2023-05-01)"));
    }

    #[test]
    fn box_whiskers_end_at_data_inside_fences() {
        let d = |m| chrono::NaiveDate::from_ymd_opt(2022, m, 1).unwrap();
        let diesel = [5.0, 5.2, 5.4, 5.5, 5.6, 5.8, 6.0, 9.5];
        let mut obs: Vec<crate::domain::Observation> = diesel
            .iter()
            .zip(1..)
            .map(|(&v, m)| crate::domain::Observation {
                date: d(m),
                diesel: v,
                gasoline: 3.0,
                brent_usd: 80.0,
                fx: 5.0,
            })
            .collect();
        let first = obs[0];
        obs.push(crate::domain::Observation { date: d(12), ..first });
        let data = derive(&obs, d(12));

        let boxes = regime_boxes(&data, Series::Diesel);
        let (regime, pre) = &boxes[0];
        assert_eq!(*regime, Regime::Pre);

        let iqr = pre.q3 - pre.q1;
        let inside: Vec<f64> = diesel
            .iter()
            .copied()
            .filter(|v| *v >= pre.q1 - 1.5 * iqr && *v <= pre.q3 + 1.5 * iqr)
            .collect();
        assert_eq!(pre.whisker_low, 5.0);
        assert_eq!(pre.whisker_high, inside.iter().copied().fold(f64::MIN, f64::max));
        assert_eq!(pre.whisker_high, 6.0);
        assert!(pre.whisker_high < pre.q3 + 1.5 * iqr);
        assert_eq!(pre.outliers, vec![9.5]);

        let svg = render_regime_box_svg(&data, Target::Diesel).unwrap();
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn render_all_names_files_in_order() {
        let figures = render_all(&data()).unwrap();
        let names: Vec<&str> = figures.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "figure1_levels.svg",
                "figure2_normalized.svg",
                "figure3_diesel_box.svg",
                "figure4_gasoline_box.svg"
            ]
        );
        assert!(figures.iter().all(|f| f.svg.ends_with("</svg>\n") || f.svg.ends_with("</svg>")));
    }
}
