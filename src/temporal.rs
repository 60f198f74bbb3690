//! # Temporal Aggregation
//!
//! Two halves: orchestration of the external CDO (Climate Data Operators)
//! command-line tool for merging monthly hourly files and computing
//! Monday-aligned weekly means, and a small in-process path for daily
//! statistics computed straight from the hourly table.
//!
//! Every CDO invocation has its exit status checked explicitly; a nonzero
//! exit is a typed error, never a silently missing output file.

use crate::inventory::{self, GapEntry, InventoryError, Resolution};
use crate::raster::{RasterError, RasterTable};
use chrono::{Datelike, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

const HOURS_PER_DAY: i64 = 24;
const DAYS_PER_WEEK: i64 = 7;

/// Errors raised during temporal aggregation
#[derive(Error, Debug)]
pub enum TemporalError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("failed to spawn cdo (is it installed?): {0}")]
    Spawn(std::io::Error),

    #[error("cdo {operation} exited with {status}")]
    CdoFailed {
        operation: String,
        status: std::process::ExitStatus,
    },

    #[error("could not parse cdo output for {operation}: '{output}'")]
    CdoOutput { operation: String, output: String },

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Result of the weekly-averaging run
#[derive(Debug)]
pub struct WeeklyOutput {
    /// Path of the weekly-averaged NetCDF file
    pub path: PathBuf,
    /// Calendar gaps found before merging (reported, never fatal)
    pub gaps: Vec<GapEntry>,
    /// Files excluded because their variable set differed from the baseline
    pub excluded: Vec<String>,
}

/// Merges the monthly hourly files under `dir` and computes Monday-aligned
/// weekly means with CDO.
///
/// Files whose variable set differs from the first file's are excluded from
/// the merge; calendar gaps are reported in the returned summary but do not
/// stop the run. Existing merge/weekly outputs are reused rather than
/// recomputed.
pub fn weekly_means(
    dir: &Path,
    prefix: &str,
    out_dir: Option<&Path>,
) -> Result<WeeklyOutput, TemporalError> {
    let mut files = inventory::list_inventory(dir, prefix)?;

    let excluded = inventory::check_variables(dir, prefix)?;
    if !excluded.is_empty() {
        warn!("Excluding files with a different variable set: {:?}", excluded);
        files.retain(|f| !excluded.contains(&f.filename));
        if files.is_empty() {
            return Err(InventoryError::Empty(prefix.to_string()).into());
        }
    }

    let gaps = inventory::check_years(&files);
    if !gaps.is_empty() {
        warn!("There are missing dates in the datasets: {:?}", gaps);
    }

    let hourly: Vec<_> = files
        .iter()
        .filter(|f| f.resolution == Resolution::Hourly)
        .collect();

    // The inventory is sorted by (year, month), so the bounds are the ends.
    let first = files
        .first()
        .ok_or_else(|| InventoryError::Empty(prefix.to_string()))?;
    let last = files
        .last()
        .ok_or_else(|| InventoryError::Empty(prefix.to_string()))?;

    let merged_name = format!(
        "{}_{}{}_{}{}.nc",
        prefix, first.year, first.month, last.year, last.month
    );
    let merged = dir.join(&merged_name);

    if !merged.is_file() {
        info!("Combining datasets. This could take a while...");
        let mut args: Vec<String> = [
            "-b", "F32", "-f", "nc4", "-P", "4", "-O", "-z", "zip_5", "-s", "mergetime",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(
            hourly
                .iter()
                .map(|f| dir.join(&f.filename).display().to_string()),
        );
        args.push(merged.display().to_string());
        run_cdo("mergetime", &args)?;
    }

    let steps = step_count(&merged)?;
    let first_timestamp = first_timestamp(&merged)?;

    let tstep_start = weekly_start_step(first_timestamp);
    let tstep_range = DAYS_PER_WEEK * HOURS_PER_DAY;

    let weekly_name = merged_name.replace(".nc", "_weekly.nc");
    let weekly = out_dir.unwrap_or(dir).join(weekly_name);

    if !weekly.is_file() {
        info!("Performing temporal averaging. This could take a while...");
        let args: Vec<String> = [
            "-O",
            "-P",
            "8",
            "-f",
            "nc4",
            "-z",
            "zip_5",
            "-s",
            "--timestat_date",
            "first",
            &format!("-timselmean,{}", tstep_range),
            &format!("-seltimestep,{}/{}", tstep_start, steps),
            &merged.display().to_string(),
            &weekly.display().to_string(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        run_cdo("timselmean", &args)?;
    }

    Ok(WeeklyOutput {
        path: weekly,
        gaps,
        excluded,
    })
}

/// First hourly time step of the first full Monday-aligned week, 1-based.
///
/// CDO's `seltimestep` counts from 1. An input starting on a Monday keeps
/// every step; otherwise the leading partial week is skipped so the weekly
/// windows align on Mondays.
pub fn weekly_start_step(first: NaiveDateTime) -> i64 {
    let weekday = first.weekday().num_days_from_monday() as i64;
    let day_offset = if weekday == 0 { 0 } else { DAYS_PER_WEEK - weekday };
    HOURS_PER_DAY * day_offset + 1
}

/// Number of time steps in a NetCDF file, via `cdo -ntime`.
fn step_count(path: &Path) -> Result<i64, TemporalError> {
    let output = capture_cdo(
        "ntime",
        &["-s".to_string(), "-ntime".to_string(), path.display().to_string()],
    )?;
    output
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or(TemporalError::CdoOutput {
            operation: "ntime".to_string(),
            output,
        })
}

/// First timestamp in a NetCDF file, via `cdo -infov`.
fn first_timestamp(path: &Path) -> Result<NaiveDateTime, TemporalError> {
    let output = capture_cdo(
        "infov",
        &["-s".to_string(), "-infov".to_string(), path.display().to_string()],
    )?;
    let re = Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").expect("valid timestamp pattern");
    re.find(&output)
        .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), "%Y-%m-%d %H:%M:%S").ok())
        .ok_or(TemporalError::CdoOutput {
            operation: "infov".to_string(),
            output,
        })
}

fn run_cdo(operation: &str, args: &[String]) -> Result<(), TemporalError> {
    debug!("Running: cdo {}", args.join(" "));
    let status = Command::new("cdo")
        .args(args)
        .status()
        .map_err(TemporalError::Spawn)?;
    if !status.success() {
        return Err(TemporalError::CdoFailed {
            operation: operation.to_string(),
            status,
        });
    }
    Ok(())
}

fn capture_cdo(operation: &str, args: &[String]) -> Result<String, TemporalError> {
    debug!("Running: cdo {}", args.join(" "));
    let output = Command::new("cdo")
        .args(args)
        .output()
        .map_err(TemporalError::Spawn)?;
    if !output.status.success() {
        return Err(TemporalError::CdoFailed {
            operation: operation.to_string(),
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Relative humidity (%) from air and dewpoint temperature in Kelvin, via
/// the Magnus formula.
pub fn relative_humidity(t_k: f64, td_k: f64) -> f64 {
    const A: f64 = 17.625;
    const B: f64 = 243.04;
    let t = t_k - 273.15;
    let td = td_k - 273.15;
    100.0 * ((A * td / (B + td)).exp() / (A * t / (B + t)).exp())
}

/// Daily statistics computed in-process from an hourly raster table.
///
/// Per (lon, lat, day): mean, min and max of the temperature variable, plus
/// daily-mean relative humidity when a dewpoint variable is given.
pub fn daily_statistics(
    raster: &RasterTable,
    temp_var: &str,
    dewpoint_var: Option<&str>,
) -> Result<DataFrame, TemporalError> {
    let mut df = raster.df.clone();

    if let Some(dew) = dewpoint_var {
        let temps = df.column(temp_var)?.f64()?;
        let dews = df.column(dew)?.f64()?;
        let rh: Float64Chunked = temps
            .into_iter()
            .zip(dews)
            .map(|(t, d)| match (t, d) {
                (Some(t), Some(d)) => Some(relative_humidity(t, d)),
                _ => None,
            })
            .collect();
        let mut rh = rh.into_series();
        rh.rename("rh_2m".into());
        df.with_column(rh)?;
    }

    let mut aggs = vec![
        col(temp_var).mean().alias(format!("{temp_var}_mean")),
        col(temp_var).min().alias(format!("{temp_var}_min")),
        col(temp_var).max().alias(format!("{temp_var}_max")),
    ];
    if dewpoint_var.is_some() {
        aggs.push(col("rh_2m").mean().alias("rh_2m_mean"));
    }

    let daily = df
        .lazy()
        .with_column(col("time").cast(DataType::Date).alias("date"))
        .group_by([col("lon"), col("lat"), col("date")])
        .agg(aggs)
        .sort(["lon", "lat", "date"], SortMultipleOptions::default())
        .collect()?;

    Ok(daily)
}
