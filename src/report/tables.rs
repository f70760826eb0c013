//! Thesis tables.
//!
//! 1. Mean and standard deviation of each series by regime
//! 2. Correlation matrix before the policy date
//! 3. Correlation matrix after the policy date
//! 4. Gasoline intervention regression (with adjusted R²)
//! 5. Diesel intervention regression (with adjusted R²)
//! 6. Structural-break tests
//!
//! A `Table` is plain data; rendering to text, Markdown and CSV lives next to it
//! so every output format shows the same rounding.

use serde::{Deserialize, Serialize};

use crate::domain::{CovKind, Regime};
use crate::fit::breaks::BreakTests;
use crate::fit::regression::InterventionFit;
use crate::math::{mean, pearson, std_dev};
use crate::models::{DerivedData, Series};

/// Decimals for descriptive and correlation tables.
const DESCRIPTIVE_DECIMALS: usize = 3;
/// Decimals for regression tables.
const REGRESSION_DECIMALS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Num { value: f64, decimals: usize },
    Text(String),
    Empty,
}

impl Cell {
    /// Numeric cell; non-finite values become a `-` placeholder (JSON has no NaN).
    pub fn num(value: f64, decimals: usize) -> Self {
        if value.is_finite() {
            Cell::Num { value, decimals }
        } else {
            Cell::Text("-".to_string())
        }
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Num { value, decimals } => {
                let decimals = *decimals;
                if value.is_finite() {
                    format!("{value:.decimals$}")
                } else {
                    "-".to_string()
                }
            }
            Cell::Text(s) => s.clone(),
            Cell::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// File stem used for exports (e.g. `table1_descriptive`).
    pub key: String,
    pub title: String,
    /// Header of the row-label column.
    pub stub: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn new(key: &str, title: impl Into<String>, stub: &str, columns: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            title: title.into(),
            stub: stub.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, label: impl Into<String>, cells: Vec<Cell>) {
        self.rows.push(TableRow {
            label: label.into(),
            cells,
        });
    }

    pub fn cell(&self, row_label: &str, column: &str) -> Option<&Cell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.label == row_label)
            .and_then(|r| r.cells.get(col))
    }

    /// Header row followed by rendered rows (label first).
    pub fn rendered_grid(&self) -> Vec<Vec<String>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(std::iter::once(self.stub.clone()).chain(self.columns.iter().cloned()).collect());
        for row in &self.rows {
            let mut line = vec![row.label.clone()];
            line.extend(row.cells.iter().map(Cell::render));
            line.resize(self.columns.len() + 1, String::new());
            grid.push(line);
        }
        grid
    }

    /// Aligned plain-text rendering for the terminal.
    pub fn to_text(&self) -> String {
        let grid = self.rendered_grid();
        let widths = column_widths(&grid);

        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        for (i, line) in grid.iter().enumerate() {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(j, (cell, &w))| {
                    if j == 0 {
                        format!("{cell:<w$}")
                    } else {
                        format!("{cell:>w$}")
                    }
                })
                .collect();
            out.push_str(cells.join("  ").trim_end());
            out.push('\n');
            if i == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                out.push_str(&rule.join("  "));
                out.push('\n');
            }
        }
        out
    }

    /// GitHub-flavored Markdown rendering.
    pub fn to_markdown(&self) -> String {
        let grid = self.rendered_grid();
        let mut out = format!("**{}**\n\n", self.title);
        for (i, line) in grid.iter().enumerate() {
            out.push_str("| ");
            out.push_str(&line.iter().map(|c| c.replace('|', "\\|")).collect::<Vec<_>>().join(" | "));
            out.push_str(" |\n");
            if i == 0 {
                out.push('|');
                for j in 0..line.len() {
                    out.push_str(if j == 0 { " :--- |" } else { " ---: |" });
                }
                out.push('\n');
            }
        }
        out
    }
}

fn column_widths(grid: &[Vec<String>]) -> Vec<usize> {
    let ncols = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..ncols)
        .map(|j| {
            grid.iter()
                .filter_map(|line| line.get(j))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect()
}

/// Table 1: mean and standard deviation by regime.
pub fn descriptive_table(data: &DerivedData) -> Table {
    let columns = Series::ALL
        .iter()
        .flat_map(|s| [format!("{} mean", s.short_name()), format!("{} std", s.short_name())])
        .collect();
    let mut table = Table::new(
        "table1_descriptive",
        "Table 1 - Mean and standard deviation by period",
        "period",
        columns,
    );

    for regime in Regime::ALL {
        let cells = Series::ALL
            .iter()
            .flat_map(|&s| {
                let values = data.regime_series(s, regime);
                [
                    Cell::num(mean(&values), DESCRIPTIVE_DECIMALS),
                    Cell::num(std_dev(&values), DESCRIPTIVE_DECIMALS),
                ]
            })
            .collect();
        table.push_row(regime.label(data.policy_date), cells);
    }
    table
}

/// Tables 2 and 3: Pearson correlations within one regime.
pub fn correlation_table(data: &DerivedData, regime: Regime) -> Table {
    let (key, number) = match regime {
        Regime::Pre => ("table2_corr_pre", 2),
        Regime::Post => ("table3_corr_post", 3),
    };
    let columns = Series::ALL.iter().map(|s| s.short_name().to_string()).collect();
    let mut table = Table::new(
        key,
        format!(
            "Table {number} - Correlations, {} (n={})",
            regime.label(data.policy_date),
            data.regime_count(regime)
        ),
        "",
        columns,
    );

    let series: Vec<Vec<f64>> = Series::ALL
        .iter()
        .map(|&s| data.regime_series(s, regime))
        .collect();
    for (i, s) in Series::ALL.iter().enumerate() {
        let cells = series
            .iter()
            .map(|other| Cell::num(pearson(&series[i], other), DESCRIPTIVE_DECIMALS))
            .collect();
        table.push_row(s.short_name(), cells);
    }
    table
}

/// Tables 4 and 5: coefficient table with a trailing adjusted-R² row.
pub fn regression_table(fit: &InterventionFit, number: usize) -> Table {
    let stat = match fit.ols.cov {
        CovKind::Nonrobust => "t",
        CovKind::Hc1 | CovKind::Hac => "z",
    };
    let columns = vec![
        "Coef.".to_string(),
        "Std.Err.".to_string(),
        stat.to_string(),
        format!("P>|{stat}|"),
        "[0.025".to_string(),
        "0.975]".to_string(),
    ];
    let mut table = Table::new(
        &format!("table{number}_{}", fit.target.short_name()),
        format!(
            "Table {number} - {} intervention model (n={}, cov={})",
            fit.target.display_name(),
            fit.ols.n,
            fit.ols.cov.display_name()
        ),
        "",
        columns,
    );

    for c in &fit.ols.coefficients {
        table.push_row(
            c.name.clone(),
            [c.estimate, c.std_err, c.t_stat, c.p_value, c.ci_low, c.ci_high]
                .into_iter()
                .map(|v| Cell::num(v, REGRESSION_DECIMALS))
                .collect(),
        );
    }

    let mut adj = vec![Cell::Empty; table.columns.len()];
    if let Some(last) = adj.last_mut() {
        *last = Cell::num(fit.ols.adj_r_squared, REGRESSION_DECIMALS);
    }
    table.push_row("Adj. R²", adj);
    table
}

/// Table 6: Chow test at the policy date and the sup-F scan, one row per fuel.
pub fn break_table(tests: &[BreakTests]) -> Table {
    let columns = [
        "Chow F",
        "Chow p",
        "Chow break",
        "sup-F",
        "nominal p",
        "Est. break",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let mut table = Table::new("table6_breaks", "Table 6 - Structural-break tests", "series", columns);

    for t in tests {
        let mut cells = match &t.chow {
            Some(c) => vec![
                Cell::num(c.f_stat, REGRESSION_DECIMALS),
                Cell::num(c.p_value, REGRESSION_DECIMALS),
                Cell::Text(c.break_date.to_string()),
            ],
            None => vec![Cell::Empty, Cell::Empty, Cell::Empty],
        };
        match &t.scan {
            Some(s) => cells.extend([
                Cell::num(s.sup_f, REGRESSION_DECIMALS),
                Cell::num(s.nominal_p_value, REGRESSION_DECIMALS),
                Cell::Text(s.break_date.to_string()),
            ]),
            None => cells.extend([Cell::Empty, Cell::Empty, Cell::Empty]),
        }
        table.push_row(t.target.short_name(), cells);
    }
    table
}

/// Tables 1–3 (descriptive only).
pub fn descriptive_tables(data: &DerivedData) -> Vec<Table> {
    vec![
        descriptive_table(data),
        correlation_table(data, Regime::Pre),
        correlation_table(data, Regime::Post),
    ]
}

/// Every table of a full analysis, in thesis order.
pub fn all_tables(data: &DerivedData, fits: &[InterventionFit], breaks: &[BreakTests]) -> Vec<Table> {
    let mut tables = descriptive_tables(data);
    // Gasoline is table 4 and diesel table 5 (the order of `Target::ALL`).
    tables.extend(fits.iter().enumerate().map(|(i, fit)| regression_table(fit, 4 + i)));
    tables.push(break_table(breaks));
    tables
}
