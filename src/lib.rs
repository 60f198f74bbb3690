//! # nc2nuts
//!
//! A Rust library for aggregating gridded climate reanalysis data onto NUTS
//! administrative regions and joining the result with Eurostat weekly tables.
//!
//! ## Features
//!
//! - **Area-weighted aggregation**: grid cells are weighted by the area each
//!   contributes to a region polygon, normalized per region
//! - **Temporal aggregation**: Monday-aligned weekly means through the
//!   external CDO tool, daily statistics in-process
//! - **Archive downloads**: monthly hourly NetCDF files from a CDS-style
//!   archive, with gap detection and retry-free per-month outcomes
//! - **Eurostat joins**: dissemination-API TSV tables reshaped to one row
//!   per (region, week) and joined on the Monday of each ISO week
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nc2nuts::{process_aggregation_job, input::JobConfig};
//!
//! // Load configuration from a JSON file
//! let config = JobConfig::from_file("job.json").expect("Failed to load config");
//!
//! // Aggregate the NetCDF file onto NUTS regions and write the table
//! process_aggregation_job(&config).expect("Failed to aggregate");
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "nc_key": "ERA_land_weekly.nc",
//!   "regions_key": "NUTS_RG_01M_2021_4326.geojson",
//!   "output_key": "weekly_by_region.parquet",
//!   "levels": [3],
//!   "countries": ["EL"],
//!   "workers": 4
//! }
//! ```

pub mod aggregate;
pub mod analysis;
pub mod cli;
pub mod download;
pub mod eurostat;
pub mod grid;
pub mod info;
pub mod input;
pub mod inventory;
pub mod log;
pub mod output;
pub mod raster;
pub mod regions;
pub mod temporal;
pub mod weights;

#[cfg(test)]
mod cli_tests;

use crate::aggregate::AggregationReport;
use crate::eurostat::{join_weekly, melt_weekly, EurostatClient};
use crate::input::JobConfig;
use crate::log::show_netcdf_file_info;
use crate::output::{read_dataframe, write_dataframe};
use crate::regions::RegionSet;
use polars::prelude::DataFrame;

/// Aggregates a NetCDF file onto NUTS regions according to the job
/// configuration.
///
/// This function orchestrates the spatial pipeline:
/// 1. Opens the NetCDF file and echoes its structure
/// 2. Reads the NUTS boundary file, subset to the configured levels and
///    countries
/// 3. Computes normalized area weights and aggregates every variable per
///    region and time step
/// 4. Optionally fetches a Eurostat weekly table and joins it on
///    (region, Monday-of-week)
/// 5. Writes the resulting table to the configured output path
///
/// Regions that fail to aggregate are captured in the returned report; they
/// never abort the run.
///
/// # Examples
///
/// ```rust,no_run
/// use nc2nuts::{process_aggregation_job, input::JobConfig};
///
/// let config = JobConfig::from_file("job.yaml")?;
/// let report = process_aggregation_job(&config)?;
/// for outcome in report.failed() {
///     eprintln!("{} failed", outcome.nuts_id);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// This function will return an error if:
/// - The NetCDF file cannot be opened or has no usable coordinate axes
/// - The boundary file cannot be parsed
/// - The Eurostat table cannot be fetched (when configured)
/// - The output table cannot be written
pub fn process_aggregation_job(
    config: &JobConfig,
) -> Result<AggregationReport, Box<dyn std::error::Error>> {
    let file = netcdf::open(&config.nc_key)?;
    show_netcdf_file_info(&file)?;
    file.close()?;

    let regions = RegionSet::from_geojson_file(
        &config.regions_key,
        &config.levels,
        config.countries.as_deref(),
    )?;
    if regions.is_empty() {
        return Err(format!(
            "No regions in '{}' match levels {:?}",
            config.regions_key, config.levels
        )
        .into());
    }

    let report = aggregate::aggregate_all(&config.nc_key, &regions, config.workers)?;

    let table = match &config.eurostat_dataset {
        Some(dataset) => {
            let client = EurostatClient::default();
            let wide = client.fetch_table(dataset)?;
            let long = melt_weekly(&wide)?;
            join_weekly(&long, &report.df)?
        }
        None => report.df.clone(),
    };
    write_dataframe(&table, &config.output_key)?;

    Ok(report)
}

/// Joins an aggregated climate table with a Eurostat weekly table and writes
/// the result.
///
/// The climate table is read from `climate_path`, the Eurostat dataset is
/// fetched from the dissemination API and reshaped to one row per
/// (region, week), and the two are joined on the region identifier and the
/// Monday of each ISO week.
///
/// # Errors
///
/// This function will return an error if the climate table cannot be read,
/// the Eurostat download fails, or the joined table cannot be written.
pub fn process_join_job(
    climate_path: &str,
    dataset: &str,
    output_path: &str,
) -> Result<DataFrame, Box<dyn std::error::Error>> {
    let climate = read_dataframe(climate_path)?;

    let client = EurostatClient::default();
    let wide = client.fetch_table(dataset)?;
    let long = melt_weekly(&wide)?;
    let joined = join_weekly(&long, &climate)?;

    write_dataframe(&joined, output_path)?;
    Ok(joined)
}
