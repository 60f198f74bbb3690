//! # Reanalysis Archive Downloads
//!
//! Acquisition of monthly hourly NetCDF files from a Climate Data Store
//! style archive. One file per (year, month) is requested and written as
//! `<prefix>_yr_<year>_mnth_<month>.nc`, the naming scheme the inventory
//! module parses back.
//!
//! Credentials come from the `CDSAPI_URL` and `CDSAPI_KEY` environment
//! variables. Failures are captured per month and never abort a range run.

use crate::inventory::{self, InventoryError};
use crate::raster::{decode_time_axis, RasterError};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://cds.climate.copernicus.eu/api";

/// Default dataset identifier on the archive
pub const DEFAULT_DATASET: &str = "reanalysis-era5-land";
/// Default filename prefix for downloaded files
pub const DEFAULT_PREFIX: &str = "ERA_land";
/// Default set of surface variables
pub const DEFAULT_VARIABLES: &[&str] = &[
    "2m_dewpoint_temperature",
    "2m_temperature",
    "forecast_albedo",
    "skin_reservoir_content",
    "surface_sensible_heat_flux",
    "total_evaporation",
    "total_precipitation",
];
/// Default bounding box as (north, west, south, east)
pub const DEFAULT_AREA: [f64; 4] = [43.0, 18.0, 33.0, 36.0];

/// Errors raised while downloading archive data
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("CDSAPI_KEY environment variable is not set")]
    MissingCredentials,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error writing '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Request body sent to the archive for one month of hourly data
#[derive(Serialize, Debug, Clone)]
pub struct DownloadRequest {
    pub format: String,
    #[serde(rename = "variable")]
    pub variables: Vec<String>,
    pub year: String,
    pub month: String,
    #[serde(rename = "day")]
    pub days: Vec<String>,
    #[serde(rename = "time")]
    pub times: Vec<String>,
    pub area: [f64; 4],
}

impl DownloadRequest {
    /// Full-month hourly request for the plan's variables and bounding box.
    pub fn for_month(plan: &DownloadPlan, year: i32, month: u32) -> Self {
        Self {
            format: "netcdf".to_string(),
            variables: plan.variables.clone(),
            year: year.to_string(),
            month: month.to_string(),
            days: (1..=31).map(|d| d.to_string()).collect(),
            times: (0..24).map(|h| format!("{h:02}:00")).collect(),
            area: plan.area,
        }
    }
}

/// What to download and where to put it
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub dataset: String,
    pub prefix: String,
    pub variables: Vec<String>,
    pub area: [f64; 4],
    pub dir: PathBuf,
}

impl DownloadPlan {
    /// ERA5-Land surface variables over the default bounding box.
    pub fn era5_land(dir: &Path) -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
            area: DEFAULT_AREA,
            dir: dir.to_path_buf(),
        }
    }

    /// Target filename for one month of this plan.
    pub fn target(&self, year: i32, month: u32) -> PathBuf {
        self.dir
            .join(format!("{}_yr_{}_mnth_{}.nc", self.prefix, year, month))
    }
}

/// Result of one monthly download attempt
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub year: i32,
    pub month: u32,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    /// File was already on disk
    Skipped,
    Failed(String),
}

impl DownloadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, DownloadStatus::Failed(_))
    }
}

/// Blocking client for a CDS-style archive API
pub struct CdsClient {
    base_url: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl CdsClient {
    /// Builds a client from `CDSAPI_URL` (optional) and `CDSAPI_KEY`.
    pub fn from_env() -> Result<Self, DownloadError> {
        let base_url =
            std::env::var("CDSAPI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token = std::env::var("CDSAPI_KEY").map_err(|_| DownloadError::MissingCredentials)?;
        Ok(Self::new(base_url, token))
    }

    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url,
            token,
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Retrieves one request from the archive and writes it to `target`.
    ///
    /// The body is streamed to a `.part` file first so an interrupted
    /// transfer never leaves a truncated `.nc` behind.
    pub fn retrieve(
        &self,
        dataset: &str,
        request: &DownloadRequest,
        target: &Path,
    ) -> Result<(), DownloadError> {
        let url = format!("{}/resources/{}", self.base_url, dataset);
        debug!("POST {} for {}-{}", url, request.year, request.month);

        let mut response = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(request)
            .send()?
            .error_for_status()?;

        let partial = target.with_extension("nc.part");
        let io_err = |source| DownloadError::Io {
            path: partial.display().to_string(),
            source,
        };
        let mut file = fs::File::create(&partial).map_err(io_err)?;
        response.copy_to(&mut file)?;
        fs::rename(&partial, target).map_err(|source| DownloadError::Io {
            path: target.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

/// Downloads one month, capturing the result instead of propagating it.
pub fn download_month(
    client: &CdsClient,
    plan: &DownloadPlan,
    year: i32,
    month: u32,
) -> DownloadOutcome {
    let target = plan.target(year, month);
    if target.is_file() {
        debug!("{} already exists, skipping", target.display());
        return DownloadOutcome {
            year,
            month,
            status: DownloadStatus::Skipped,
        };
    }

    if let Err(e) = fs::create_dir_all(&plan.dir) {
        warn!("Could not create '{}': {}", plan.dir.display(), e);
        return DownloadOutcome {
            year,
            month,
            status: DownloadStatus::Failed(e.to_string()),
        };
    }

    info!("Downloading: Year: {} -- Month: {}", year, month);
    let request = DownloadRequest::for_month(plan, year, month);
    let status = match client.retrieve(&plan.dataset, &request, &target) {
        Ok(()) => {
            info!("Finished: Year: {} -- Month: {}", year, month);
            DownloadStatus::Downloaded
        }
        Err(e) => {
            warn!("Year: {} -- Month: {} failed to download: {}", year, month, e);
            DownloadStatus::Failed(e.to_string())
        }
    };
    DownloadOutcome {
        year,
        month,
        status,
    }
}

/// Every (year, month) pair between the inclusive bounds, in order.
pub fn month_range(
    year_start: i32,
    month_start: u32,
    year_end: i32,
    month_end: u32,
) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    for year in year_start..=year_end {
        let lo = if year == year_start { month_start } else { 1 };
        let hi = if year == year_end { month_end } else { 12 };
        for month in lo..=hi {
            months.push((year, month));
        }
    }
    months
}

/// Downloads every month in the inclusive range, skipping files already on
/// disk. Per-month failures are captured in the outcomes and the loop
/// continues.
pub fn download_range(
    client: &CdsClient,
    plan: &DownloadPlan,
    year_start: i32,
    month_start: u32,
    year_end: i32,
    month_end: u32,
) -> Vec<DownloadOutcome> {
    month_range(year_start, month_start, year_end, month_end)
        .into_iter()
        .map(|(year, month)| download_month(client, plan, year, month))
        .collect()
}

/// Runs the calendar gap check over the plan's directory and attempts to
/// download every missing month.
pub fn fill_gaps(
    client: &CdsClient,
    plan: &DownloadPlan,
) -> Result<Vec<DownloadOutcome>, DownloadError> {
    let files = inventory::list_inventory(&plan.dir, &plan.prefix)?;
    let gaps = inventory::check_years(&files);
    if gaps.is_empty() {
        info!("No missing months found under {}", plan.dir.display());
        return Ok(Vec::new());
    }

    warn!("There are missing dates in the datasets: {:?}", gaps);
    info!("Attempting to download missing data");
    let mut outcomes = Vec::new();
    for gap in &gaps {
        for &month in &gap.months_missing {
            outcomes.push(download_month(client, plan, gap.year, month));
        }
    }
    Ok(outcomes)
}

/// What a refresh run decides to do, separated from the IO that does it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAction {
    /// Delete the newest file before re-downloading (its month is partial)
    pub delete_last: bool,
    /// First (year, month) to re-download, inclusive
    pub from: (i32, u32),
    /// Last (year, month) to download, inclusive
    pub to: (i32, u32),
}

/// Decides whether the tail of the archive needs refreshing.
///
/// `last` is the newest file on disk and `last_date` the final timestamp it
/// contains. Nothing happens while `last_date` lags `now` by at most
/// `threshold_days`; the archive itself publishes that far behind
/// real time. Past the threshold, months from the newest file up to
/// `now` minus `threshold_days / 30` months are downloaded again, and the
/// newest file is deleted first when its month is only partially present.
pub fn refresh_action(
    last: (i32, u32),
    last_date: NaiveDateTime,
    now: NaiveDateTime,
    threshold_days: i64,
) -> Option<RefreshAction> {
    if (now - last_date).num_days() <= threshold_days {
        return None;
    }
    let last_day = last_date.date();
    let delete_last = last_day.day() != days_in_month(last_day.year(), last_day.month());
    let to = months_back(now.year(), now.month(), threshold_days.max(0) as u32 / 30);
    Some(RefreshAction {
        delete_last,
        from: last,
        to,
    })
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// Steps a calendar month backwards, borrowing across years.
fn months_back(year: i32, month: u32, steps: u32) -> (i32, u32) {
    let total = year as i64 * 12 + month as i64 - 1 - steps as i64;
    (total.div_euclid(12) as i32, (total.rem_euclid(12) + 1) as u32)
}

/// Re-downloads the stale tail of the archive.
///
/// Reads the final timestamp of the newest file in the plan's directory and
/// applies [`refresh_action`] against the current date. Per-month failures
/// are captured in the outcomes as in [`download_range`].
pub fn refresh(
    client: &CdsClient,
    plan: &DownloadPlan,
    threshold_days: i64,
) -> Result<Vec<DownloadOutcome>, DownloadError> {
    let files = inventory::list_inventory(&plan.dir, &plan.prefix)?;
    let Some(last) = files.last() else {
        return Ok(Vec::new());
    };

    let path = plan.dir.join(&last.filename);
    let file = netcdf::open(&path).map_err(RasterError::NetCdf)?;
    let last_date = decode_time_axis(&file)?
        .last()
        .copied()
        .ok_or(RasterError::MissingTime)?;
    drop(file);

    let now = chrono::Utc::now().naive_utc();
    let Some(action) = refresh_action((last.year, last.month), last_date, now, threshold_days) else {
        info!(
            "Newest data in {} is {}, within {} days of today",
            plan.dir.display(),
            last_date.date(),
            threshold_days
        );
        return Ok(Vec::new());
    };

    if action.delete_last {
        warn!("Deleting incomplete newest file {}", path.display());
        fs::remove_file(&path).map_err(|source| DownloadError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }

    info!(
        "Refreshing archive from {}-{:02} to {}-{:02}",
        action.from.0, action.from.1, action.to.0, action.to.1
    );
    Ok(download_range(
        client,
        plan,
        action.from.0,
        action.from.1,
        action.to.0,
        action.to.1,
    ))
}
