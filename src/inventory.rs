//! # Monthly File Inventory
//!
//! Consistency checks over a directory of monthly NetCDF downloads before
//! they are merged: filename parsing, calendar-gap detection and
//! variable-set comparison. All checks report; none repairs.

use log::warn;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

// Compiled once; parse_name runs per directory entry.
static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"yr_(\d+)").expect("valid year pattern"));
static MONTH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mnth_(\d+)").expect("valid month pattern"));

/// Errors raised while scanning the download directory
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("IO error scanning '{dir}': {source}")]
    Io {
        dir: String,
        source: std::io::Error,
    },

    #[error("NetCDF error reading '{file}': {source}")]
    NetCdf {
        file: String,
        source: netcdf::Error,
    },

    #[error("no files matching prefix '{0}' found")]
    Empty(String),
}

/// Temporal resolution encoded in a dataset filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hourly,
    Daily,
    Weekly,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Hourly => write!(f, "hourly"),
            Resolution::Daily => write!(f, "daily"),
            Resolution::Weekly => write!(f, "weekly"),
        }
    }
}

/// One monthly data file, parsed from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyFile {
    pub year: i32,
    pub month: u32,
    pub resolution: Resolution,
    pub filename: String,
}

/// Parses the `(year, month, resolution)` tokens embedded in a filename.
///
/// Filenames carry `yr_<int>` and `mnth_<int>` tokens plus an optional
/// `weekly`/`daily` keyword (absent means hourly). A name that does not
/// match is reported and dropped, and processing continues without it.
pub fn parse_name(filename: &str) -> Option<MonthlyFile> {
    let parsed = (|| {
        let year: i32 = YEAR_TOKEN.captures(filename)?[1].parse().ok()?;
        let month: u32 = MONTH_TOKEN.captures(filename)?[1].parse().ok()?;
        let resolution = if filename.contains("weekly") {
            Resolution::Weekly
        } else if filename.contains("daily") {
            Resolution::Daily
        } else {
            Resolution::Hourly
        };
        Some(MonthlyFile {
            year,
            month,
            resolution,
            filename: filename.to_string(),
        })
    })();

    if parsed.is_none() {
        warn!("ERROR: {} failed to be parsed", filename);
    }
    parsed
}

/// Scans a directory for `<prefix>*.nc` files, sorted by (year, month).
///
/// Unparseable names are dropped with a warning.
pub fn list_inventory(dir: &Path, prefix: &str) -> Result<Vec<MonthlyFile>, InventoryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| InventoryError::Io {
        dir: dir.display().to_string(),
        source,
    })?;

    let mut files: Vec<MonthlyFile> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix) && name.ends_with(".nc"))
        .filter_map(|name| parse_name(&name))
        .collect();

    if files.is_empty() {
        return Err(InventoryError::Empty(prefix.to_string()));
    }
    files.sort_by_key(|f| (f.year, f.month));
    Ok(files)
}

/// Months missing from one calendar year of the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapEntry {
    pub year: i32,
    pub months_missing: Vec<u32>,
}

/// Detects calendar gaps in the inventory.
///
/// For every year between the earliest and latest year present, the months
/// on disk are compared against the contiguous span
/// `[min_month_present, max_month_present]` of that same year. Only gaps
/// inside that span are detected: a year missing entirely, or months before
/// the first / after the last present month, pass unnoticed. That blind
/// spot is inherited behavior, kept as-is.
pub fn check_years(files: &[MonthlyFile]) -> Vec<GapEntry> {
    let years = || files.iter().map(|f| f.year);
    let (Some(min_year), Some(max_year)) = (years().min(), years().max()) else {
        return Vec::new();
    };

    let mut gaps = Vec::new();
    for year in min_year..=max_year {
        let months: BTreeSet<u32> = files
            .iter()
            .filter(|f| f.year == year)
            .map(|f| f.month)
            .collect();
        let (Some(&lo), Some(&hi)) = (months.first(), months.last()) else {
            continue;
        };
        let missing: Vec<u32> = (lo..=hi).filter(|m| !months.contains(m)).collect();
        if !missing.is_empty() {
            gaps.push(GapEntry {
                year,
                months_missing: missing,
            });
        }
    }
    gaps
}

/// Checks that every file in the inventory carries the same variable set.
///
/// The first file's variable set is the baseline. A file whose set has not
/// been seen before is flagged as an outlier to exclude from merging; the
/// first file itself is never flagged.
pub fn check_variables(dir: &Path, prefix: &str) -> Result<Vec<String>, InventoryError> {
    let files = list_inventory(dir, prefix)?;

    let mut seen: Vec<BTreeSet<String>> = Vec::new();
    let mut different = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let path = dir.join(&file.filename);
        let vars = data_variable_set(&path).map_err(|source| InventoryError::NetCdf {
            file: file.filename.clone(),
            source,
        })?;
        if !seen.contains(&vars) {
            seen.push(vars);
            if i != 0 {
                different.push(file.filename.clone());
            }
        }
    }
    Ok(different)
}

/// The data-variable names of a NetCDF file, excluding coordinate variables
/// and time bounds.
fn data_variable_set(path: &Path) -> Result<BTreeSet<String>, netcdf::Error> {
    let file = netcdf::open(path)?;
    let dims: BTreeSet<String> = file.dimensions().map(|d| d.name().to_string()).collect();
    Ok(file
        .variables()
        .map(|v| v.name().to_string())
        .filter(|name| !dims.contains(name) && name != "time_bnds")
        .collect())
}
