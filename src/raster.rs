//! # Raster Extraction
//!
//! Reads a gridded NetCDF climate file into a long Polars DataFrame with one
//! row per (time, lat, lon) and one column per data variable, plus the
//! rounded coordinates and their millidegree join keys.
//!
//! Coordinate dimensions named with the usual aliases (`longitude`, `Lats`,
//! ...) are normalized to `lon`/`lat`. The time axis is decoded from its CF
//! `units` attribute (`<unit> since <base datetime>`).
//!
//! Data variables are mask-and-scaled per CF conventions: cells equal to
//! `_FillValue` or `missing_value` become nulls (ERA5-Land is ocean-masked),
//! and packed variables are decoded with `scale_factor`/`add_offset`.
//! Downstream aggregations skip the nulls.

use crate::grid::{coord_key, round3};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use polars::prelude::*;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

const LON_ALIASES: [&str; 6] = ["longitude", "Longitude", "lon", "Lon", "lons", "Lons"];
const LAT_ALIASES: [&str; 6] = ["latitude", "Latitude", "lat", "Lat", "lats", "Lats"];

/// Errors raised while extracting a raster into a table
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("no longitude coordinate found (looked for {LON_ALIASES:?})")]
    MissingLongitude,

    #[error("no latitude coordinate found (looked for {LAT_ALIASES:?})")]
    MissingLatitude,

    #[error("no time coordinate found")]
    MissingTime,

    #[error("cannot parse time units attribute '{0}'")]
    BadTimeUnits(String),

    #[error("variable '{name}' has unsupported dimensions {dims:?}")]
    UnsupportedDims { name: String, dims: Vec<String> },

    #[error("file contains no gridded data variables")]
    NoDataVariables,
}

/// A raster flattened into a long table
#[derive(Debug, Clone)]
pub struct RasterTable {
    /// Columns: `lon`, `lat`, `lon_key`, `lat_key`, `time`, then one column
    /// per data variable
    pub df: DataFrame,
    /// Names of the data-variable columns
    pub variables: Vec<String>,
    /// Longitude axis as stored in the file
    pub lons: Vec<f64>,
    /// Latitude axis as stored in the file
    pub lats: Vec<f64>,
}

impl RasterTable {
    /// Opens a NetCDF file and flattens it into the long form.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let file = netcdf::open(path.as_ref())?;

        let lon_name = find_coordinate(&file, &LON_ALIASES).ok_or(RasterError::MissingLongitude)?;
        let lat_name = find_coordinate(&file, &LAT_ALIASES).ok_or(RasterError::MissingLatitude)?;

        let lons = read_axis(&file, &lon_name)?;
        let lats = read_axis(&file, &lat_name)?;
        let times = decode_time_axis(&file)?;

        let variables: Vec<String> = file
            .variables()
            .filter(|v| {
                let name = v.name();
                name != lon_name && name != lat_name && name != "time" && name != "time_bnds"
            })
            .filter(|v| v.dimensions().len() >= 2)
            .map(|v| v.name().to_string())
            .collect();
        if variables.is_empty() {
            return Err(RasterError::NoDataVariables);
        }

        let n_rows = times.len() * lats.len() * lons.len();
        let mut lon_col = Vec::with_capacity(n_rows);
        let mut lat_col = Vec::with_capacity(n_rows);
        let mut lon_key_col = Vec::with_capacity(n_rows);
        let mut lat_key_col = Vec::with_capacity(n_rows);
        let mut time_col: Vec<i64> = Vec::with_capacity(n_rows);
        for &t in &times {
            for &lat in &lats {
                for &lon in &lons {
                    lon_col.push(round3(lon));
                    lat_col.push(round3(lat));
                    lon_key_col.push(coord_key(lon));
                    lat_key_col.push(coord_key(lat));
                    time_col.push(t.and_utc().timestamp_millis());
                }
            }
        }

        let mut columns: Vec<Column> = vec![
            Series::new("lon".into(), lon_col).into(),
            Series::new("lat".into(), lat_col).into(),
            Series::new("lon_key".into(), lon_key_col).into(),
            Series::new("lat_key".into(), lat_key_col).into(),
            Int64Chunked::from_vec("time".into(), time_col)
                .into_datetime(TimeUnit::Milliseconds, None)
                .into_series()
                .into(),
        ];

        for var_name in &variables {
            let values = read_variable_long(
                &file,
                var_name,
                &lon_name,
                &lat_name,
                times.len(),
                lats.len(),
                lons.len(),
            )?;
            columns.push(Series::new(var_name.as_str().into(), values).into());
        }

        let df = DataFrame::new(columns)?;
        debug!(
            "Extracted raster table: {} rows, variables {:?}",
            df.height(),
            variables
        );

        Ok(RasterTable {
            df,
            variables,
            lons,
            lats,
        })
    }
}

fn find_coordinate(file: &netcdf::File, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find(|name| file.variable(name).is_some())
        .map(|name| name.to_string())
}

fn read_axis(file: &netcdf::File, name: &str) -> Result<Vec<f64>, RasterError> {
    let var = file.variable(name).ok_or(RasterError::MissingTime)?;
    let values = var.get::<f64, _>(..)?;
    Ok(values.iter().copied().collect())
}

/// Decodes the time coordinate into naive datetimes using its CF `units`
/// attribute, e.g. `"hours since 1900-01-01 00:00:00"`.
pub fn decode_time_axis(file: &netcdf::File) -> Result<Vec<NaiveDateTime>, RasterError> {
    let var = file.variable("time").ok_or(RasterError::MissingTime)?;
    let units = var
        .attribute("units")
        .and_then(|a| a.value().ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        })
        .ok_or_else(|| RasterError::BadTimeUnits(String::from("<missing>")))?;

    let (per_step, base) = parse_time_units(&units)?;
    let raw = var.get::<f64, _>(..)?;
    Ok(raw
        .iter()
        .map(|&v| base + chrono::Duration::seconds((v * per_step) as i64))
        .collect())
}

fn parse_time_units(units: &str) -> Result<(f64, NaiveDateTime), RasterError> {
    let re = Regex::new(
        r"^(seconds|minutes|hours|days)\s+since\s+(\d{4}-\d{2}-\d{2})(?:[ T](\d{2}:\d{2}(?::\d{2})?))?",
    )
    .expect("valid units pattern");
    let caps = re
        .captures(units)
        .ok_or_else(|| RasterError::BadTimeUnits(units.to_string()))?;

    let per_step = match &caps[1] {
        "seconds" => 1.0,
        "minutes" => 60.0,
        "hours" => 3600.0,
        _ => 86400.0,
    };
    let date = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d")
        .map_err(|_| RasterError::BadTimeUnits(units.to_string()))?;
    let time = match caps.get(3) {
        Some(t) => {
            let raw = t.as_str();
            let fmt = if raw.len() == 5 { "%H:%M" } else { "%H:%M:%S" };
            NaiveTime::parse_from_str(raw, fmt)
                .map_err(|_| RasterError::BadTimeUnits(units.to_string()))?
        }
        None => NaiveTime::MIN,
    };
    Ok((per_step, date.and_time(time)))
}

/// CF mask-and-scale parameters of one data variable.
///
/// Masking compares against the raw (packed) value, as the conventions
/// require; scale and offset apply afterwards.
struct MaskScale {
    fill: Option<f64>,
    missing: Option<f64>,
    scale: f64,
    offset: f64,
}

impl MaskScale {
    fn from_variable(var: &netcdf::Variable) -> Self {
        Self {
            fill: numeric_attribute(var, "_FillValue"),
            missing: numeric_attribute(var, "missing_value"),
            scale: numeric_attribute(var, "scale_factor").unwrap_or(1.0),
            offset: numeric_attribute(var, "add_offset").unwrap_or(0.0),
        }
    }

    fn decode(&self, raw: f64) -> Option<f64> {
        if raw.is_nan()
            || self.fill.is_some_and(|f| raw == f)
            || self.missing.is_some_and(|m| raw == m)
        {
            return None;
        }
        Some(raw * self.scale + self.offset)
    }
}

fn numeric_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    use netcdf::AttributeValue::*;
    match var.attribute(name)?.value().ok()? {
        Double(v) => Some(v),
        Float(v) => Some(v as f64),
        Longlong(v) => Some(v as f64),
        Int(v) => Some(v as f64),
        Short(v) => Some(v as f64),
        Schar(v) => Some(v as f64),
        Doubles(v) => v.first().copied(),
        Floats(v) => v.first().map(|&f| f as f64),
        _ => None,
    }
}

/// Reads one data variable and flattens it to (time, lat, lon) row order,
/// mask-and-scaled.
///
/// Variables stored as (time, lat, lon) are read directly; a variable
/// without a time dimension, (lat, lon), is broadcast across every time
/// step.
fn read_variable_long(
    file: &netcdf::File,
    name: &str,
    lon_name: &str,
    lat_name: &str,
    n_time: usize,
    n_lat: usize,
    n_lon: usize,
) -> Result<Vec<Option<f64>>, RasterError> {
    let var = file.variable(name).ok_or(RasterError::MissingTime)?;
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    let decoder = MaskScale::from_variable(&var);
    let values = var.get::<f64, _>(..)?;

    let dim_names: Vec<&str> = dims.iter().map(|s| s.as_str()).collect();
    match dim_names.as_slice() {
        [t, la, lo] if *t == "time" && *la == lat_name && *lo == lon_name => {
            Ok(values.iter().map(|&v| decoder.decode(v)).collect())
        }
        [la, lo] if *la == lat_name && *lo == lon_name => {
            let spatial: Vec<Option<f64>> = values.iter().map(|&v| decoder.decode(v)).collect();
            let mut out = Vec::with_capacity(n_time * n_lat * n_lon);
            for _ in 0..n_time {
                out.extend_from_slice(&spatial);
            }
            Ok(out)
        }
        _ => Err(RasterError::UnsupportedDims {
            name: name.to_string(),
            dims,
        }),
    }
}
