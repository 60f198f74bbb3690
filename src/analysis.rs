//! # Time-Lagged Cross-Correlation
//!
//! Pearson correlation between a joined region's weekly observable and each
//! of its climate variables, evaluated over a window of integer week lags.
//! Positive lags correlate climate at week `w` with the observable at week
//! `w + lag`.

use log::warn;
use polars::prelude::*;
use thiserror::Error;

/// Columns of the joined table that are not climate variables
const NON_CLIMATE_COLUMNS: &[&str] = &["unit", "age", "sex", "nuts_id", "week", "value", "time"];

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("no climate variable columns found in the joined table")]
    NoClimateColumns,
}

/// Computes the time-lagged cross-correlation matrix for one region.
///
/// `df` is a joined table as produced by the Eurostat join. Rows are
/// filtered to `nuts_id` and `age_group`, rows with any missing value are
/// dropped, and for every lag in `start..end` the Pearson correlation of
/// each climate variable against the lag-shifted observable is computed.
/// The result has one column per climate variable plus `lag_time`.
pub fn lagged_cross_correlation(
    df: &DataFrame,
    nuts_id: &str,
    age_group: &str,
    start: i64,
    end: i64,
) -> Result<DataFrame, AnalysisError> {
    let selected = df
        .clone()
        .lazy()
        .filter(
            col("nuts_id")
                .eq(lit(nuts_id))
                .and(col("age").eq(lit(age_group))),
        )
        .drop_nulls(None)
        .sort(["time"], SortMultipleOptions::default())
        .collect()?;

    if selected.height() == 0 {
        warn!(
            "No observations for region '{}' age group '{}'",
            nuts_id, age_group
        );
    }

    let climate_columns: Vec<String> = selected
        .get_column_names()
        .iter()
        .filter(|name| !NON_CLIMATE_COLUMNS.contains(&name.as_str()))
        .map(|name| name.to_string())
        .collect();
    if climate_columns.is_empty() {
        return Err(AnalysisError::NoClimateColumns);
    }

    let values: Vec<f64> = selected
        .column("value")?
        .f64()?
        .into_no_null_iter()
        .collect();

    let lags: Vec<i64> = (start..end).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(climate_columns.len() + 1);
    for name in &climate_columns {
        let series: Vec<f64> = selected
            .column(name.as_str())?
            .f64()?
            .into_no_null_iter()
            .collect();
        let correlations: Vec<f64> = lags
            .iter()
            .map(|&lag| lagged_pearson(&series, &values, lag))
            .collect();
        columns.push(Series::new(name.as_str().into(), correlations).into());
    }
    columns.push(Series::new("lag_time".into(), lags).into());

    Ok(DataFrame::new(columns)?)
}

/// Pearson correlation of `x[i]` against `y[i + lag]` over the indices
/// where both are defined. `NaN` when fewer than two pairs exist or either
/// side is constant.
fn lagged_pearson(x: &[f64], y: &[f64], lag: i64) -> f64 {
    let n = x.len() as i64;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..n {
        let j = i + lag;
        if j >= 0 && j < n {
            xs.push(x[i as usize]);
            ys.push(y[j as usize]);
        }
    }
    pearson(&xs, &ys)
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}
