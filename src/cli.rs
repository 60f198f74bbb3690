//! # CLI Module
//!
//! This module provides the command-line interface for nc2nuts, including:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML)
//! - Environment variable support with the NC2NUTS_ prefix
//! - Subcommands for the download, temporal and spatial pipeline stages
//! - Shell completion generation

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Climate reanalysis to NUTS-region aggregation pipeline
#[derive(Parser, Debug)]
#[command(name = "nc2nuts")]
#[command(about = "Aggregate gridded climate data onto NUTS administrative regions")]
#[command(version)]
#[command(long_about = "
nc2nuts is a command-line pipeline for turning gridded climate reanalysis data
into weekly tables per NUTS administrative region. It downloads monthly NetCDF
files from a CDS-style archive, computes Monday-aligned weekly means with CDO,
aggregates grid cells onto NUTS polygons with area-based weights, and joins
the result with Eurostat weekly statistics.

FEATURES:
  • Area-weighted spatial aggregation onto NUTS boundary polygons
  • Monday-aligned weekly means via the external CDO tool
  • In-process daily statistics including Magnus-formula relative humidity
  • Eurostat dissemination-API downloads with weekly-table reshaping
  • Time-lagged cross-correlation analysis of joined tables
  • Shell completions: auto-completion for bash, zsh, fish, and PowerShell

EXAMPLES:
  # Aggregate a weekly NetCDF onto NUTS level-3 regions
  nc2nuts aggregate weekly.nc NUTS_RG_01M_2021_4326.geojson out.parquet

  # Restrict to Greece and run with four workers
  nc2nuts aggregate weekly.nc nuts.geojson out.parquet \\
    --countries EL --workers 4

  # Using a config file
  nc2nuts aggregate --config job.yaml

  # Download two years of monthly files
  nc2nuts download ./data 2019-01 2020-12

  # Compute weekly means from the downloaded files
  nc2nuts weekly ./data --prefix ERA_land

  # Join with a Eurostat weekly mortality table
  nc2nuts join out.parquet demo_r_mweek3 joined.parquet

  # File inspection
  nc2nuts info weekly.nc --detailed

  # Generate completions
  nc2nuts completions bash > ~/.bash_completion.d/nc2nuts
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for structured data
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "NC2NUTS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate a gridded NetCDF file onto NUTS regions
    #[command(long_about = "
Aggregate a gridded NetCDF file onto NUTS administrative regions.

Every grid cell is modelled as a square of half the latitude spacing around
its center. Cells intersecting a region polygon are weighted by their covered
area, the weights are normalized to sum to one, and every variable in the
file is averaged with those weights per time step.

EXAMPLES:
  # Level-3 regions, every country in the boundary file
  nc2nuts aggregate weekly.nc nuts.geojson out.parquet

  # Level-2 regions of Greece and Italy, four workers
  nc2nuts aggregate weekly.nc nuts.geojson out.parquet \\
    --levels 2 --countries EL,IT --workers 4

  # All paths from a config file
  nc2nuts aggregate --config job.json
")]
    Aggregate {
        /// Input NetCDF file path
        #[arg(value_name = "INPUT", env = "NC2NUTS_INPUT")]
        input: Option<String>,

        /// NUTS boundary GeoJSON file path
        #[arg(value_name = "REGIONS", env = "NC2NUTS_REGIONS")]
        regions: Option<String>,

        /// Output table path (Parquet or CSV)
        #[arg(value_name = "OUTPUT", env = "NC2NUTS_OUTPUT")]
        output: Option<String>,

        /// NUTS levels to keep: comma-separated, e.g. '2,3'
        #[arg(long, value_parser = parse_levels)]
        levels: Option<LevelsArg>,

        /// Country codes to keep: comma-separated, e.g. 'EL,IT'
        #[arg(long, value_parser = parse_countries, env = "NC2NUTS_COUNTRIES")]
        countries: Option<CountriesArg>,

        /// Worker threads for the per-region loop
        #[arg(long, env = "NC2NUTS_WORKERS")]
        workers: Option<usize>,
    },

    /// Join an aggregated climate table with a Eurostat weekly table
    #[command(long_about = "
Join an aggregated climate table with a Eurostat weekly table.

The Eurostat dataset is fetched from the dissemination API in TSV form,
reshaped to one row per (region, week), and its ISO week codes are mapped
to the Monday of each week. The join keys are the region identifier and
that Monday.

EXAMPLES:
  # Weekly deaths by NUTS-3 region
  nc2nuts join out.parquet demo_r_mweek3 joined.parquet
")]
    Join {
        /// Aggregated climate table (Parquet or CSV)
        climate: String,

        /// Eurostat dataset code, e.g. 'demo_r_mweek3'
        dataset: String,

        /// Output table path (Parquet or CSV)
        output: String,
    },

    /// Download monthly hourly files from the reanalysis archive
    #[command(long_about = "
Download monthly hourly NetCDF files from a CDS-style reanalysis archive.

One file per (year, month) is written as <prefix>_yr_<Y>_mnth_<M>.nc.
Files already on disk are skipped and per-month failures never abort the
run. Credentials are read from CDSAPI_URL and CDSAPI_KEY.

EXAMPLES:
  # Two full years over the default bounding box
  nc2nuts download ./data 2019-01 2020-12

  # Custom area (north,west,south,east) and variables
  nc2nuts download ./data 2020-01 2020-06 \\
    --area 43,18,33,36 --variables 2m_temperature,total_precipitation

  # Download whatever months are missing from ./data
  nc2nuts download --fill-gaps ./data

  # Refresh the tail of the archive when it lags more than 65 days
  nc2nuts download --refresh ./data
")]
    Download {
        /// Directory to store the downloaded files
        #[arg(value_name = "DIR", env = "NC2NUTS_DATA_DIR")]
        dir: PathBuf,

        /// First month to download, as YEAR-MONTH
        #[arg(value_name = "START", value_parser = parse_year_month, required_unless_present_any = ["fill_gaps", "refresh"])]
        start: Option<YearMonthArg>,

        /// Last month to download, as YEAR-MONTH
        #[arg(value_name = "END", value_parser = parse_year_month, required_unless_present_any = ["fill_gaps", "refresh"])]
        end: Option<YearMonthArg>,

        /// Archive dataset identifier
        #[arg(long, default_value = crate::download::DEFAULT_DATASET)]
        dataset: String,

        /// Filename prefix for the downloaded files
        #[arg(long, default_value = crate::download::DEFAULT_PREFIX)]
        prefix: String,

        /// Variables to download: comma-separated archive names
        #[arg(long, value_parser = parse_countries)]
        variables: Option<CountriesArg>,

        /// Bounding box as north,west,south,east
        #[arg(long, value_parser = parse_bbox)]
        area: Option<BboxArg>,

        /// Download only the months missing from DIR
        #[arg(long)]
        fill_gaps: bool,

        /// Re-download the tail of the archive when it lags behind today
        #[arg(long, conflicts_with = "fill_gaps")]
        refresh: bool,

        /// Staleness threshold in days for --refresh
        #[arg(long, default_value_t = 65)]
        threshold: i64,
    },

    /// Compute Monday-aligned weekly means with CDO
    #[command(long_about = "
Merge the monthly hourly files in a directory and compute Monday-aligned
weekly means with the external CDO tool.

Files whose variable set differs from the first file's are excluded before
merging; calendar gaps are reported but never fatal. The merged file and the
weekly file are reused when they already exist.

EXAMPLES:
  nc2nuts weekly ./data --prefix ERA_land

  # Write the weekly file somewhere else
  nc2nuts weekly ./data --out-dir ./weekly
")]
    Weekly {
        /// Directory containing the monthly hourly files
        dir: PathBuf,

        /// Filename prefix of the monthly files
        #[arg(long, default_value = crate::download::DEFAULT_PREFIX)]
        prefix: String,

        /// Directory for the weekly output (default: DIR)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Compute daily statistics from an hourly NetCDF file
    #[command(long_about = "
Compute per-cell daily statistics from an hourly NetCDF file, in-process.

Produces daily mean, minimum and maximum of the temperature variable, plus
daily-mean relative humidity derived from the dewpoint variable with the
Magnus formula.

EXAMPLES:
  nc2nuts daily hourly.nc daily.parquet

  # ERA5 single-levels names
  nc2nuts daily hourly.nc daily.parquet --temperature 2t --dewpoint 2d

  # Skip the humidity column
  nc2nuts daily hourly.nc daily.parquet --no-humidity
")]
    Daily {
        /// Input hourly NetCDF file
        input: String,

        /// Output table path (Parquet or CSV)
        output: String,

        /// Temperature variable name
        #[arg(long, default_value = "t2m")]
        temperature: String,

        /// Dewpoint variable name
        #[arg(long, default_value = "d2m")]
        dewpoint: String,

        /// Skip the relative humidity column
        #[arg(long)]
        no_humidity: bool,
    },

    /// List downloaded files and check for gaps
    #[command(long_about = "
Scan a directory of monthly files, report the inventory, and check for
missing months and inconsistent variable sets.

EXAMPLES:
  nc2nuts inventory ./data
  nc2nuts inventory ./data --prefix ERA_land --check-variables
")]
    Inventory {
        /// Directory containing the monthly files
        dir: PathBuf,

        /// Filename prefix of the monthly files
        #[arg(long, default_value = crate::download::DEFAULT_PREFIX)]
        prefix: String,

        /// Also open every file and compare variable sets
        #[arg(long)]
        check_variables: bool,
    },

    /// Time-lagged cross-correlation for one region
    #[command(long_about = "
Compute the time-lagged cross-correlation between a joined table's weekly
observable and each climate variable, for one region and age group.

Positive lags correlate climate at week w with the observable at week
w + lag. The output has one column per climate variable plus lag_time.

EXAMPLES:
  nc2nuts tlcc joined.parquet EL301 tlcc.csv

  # Custom age group and lag window
  nc2nuts tlcc joined.parquet EL301 tlcc.csv --age Y65-69 --start -10 --end 10
")]
    Tlcc {
        /// Joined table (Parquet or CSV)
        input: String,

        /// NUTS region identifier
        nuts_id: String,

        /// Output table path (Parquet or CSV)
        output: String,

        /// Age group to select
        #[arg(long, default_value = "TOTAL")]
        age: String,

        /// First lag of the window (inclusive)
        #[arg(long, default_value_t = -30, allow_hyphen_values = true)]
        start: i64,

        /// End of the lag window (exclusive)
        #[arg(long, default_value_t = 30)]
        end: i64,
    },

    /// Show information about a NetCDF file
    #[command(long_about = "
Inspect a NetCDF file and display its structure.

EXAMPLES:
  # Basic file info
  nc2nuts info data.nc

  # Detailed information including global attributes
  nc2nuts info weekly.nc --detailed

  # Info about a specific variable
  nc2nuts info data.nc -n t2m

  # JSON output for scripting
  nc2nuts info data.nc --format json
")]
    Info {
        /// NetCDF file path
        file: String,

        /// Show global attributes as well
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for various shells.

INSTALLATION:
  # Bash (add to ~/.bashrc or /etc/bash_completion.d/)
  nc2nuts completions bash > ~/.bash_completion.d/nc2nuts

  # Zsh (add to fpath)
  nc2nuts completions zsh > ~/.zsh/completions/_nc2nuts

  # Fish
  nc2nuts completions fish > ~/.config/fish/completions/nc2nuts.fish

  # PowerShell (add to profile)
  nc2nuts completions powershell > nc2nuts.ps1
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output (where applicable)
    Csv,
}

/// NUTS levels argument from the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelsArg(pub Vec<i64>);

/// Comma-separated string list argument (country codes, variable names)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountriesArg(pub Vec<String>);

/// Bounding box argument as (north, west, south, east)
#[derive(Clone, Debug, PartialEq)]
pub struct BboxArg(pub [f64; 4]);

/// Year-month argument from the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YearMonthArg {
    pub year: i32,
    pub month: u32,
}

/// Parse NUTS levels: '3' or '2,3'
fn parse_levels(s: &str) -> Result<LevelsArg, String> {
    let levels: Result<Vec<i64>, _> = s.split(',').map(|v| v.trim().parse::<i64>()).collect();
    let levels = levels.map_err(|_| "Levels must be integers, e.g. '2,3'".to_string())?;
    if levels.is_empty() {
        return Err("At least one level is required".to_string());
    }
    if levels.iter().any(|l| !(0..=3).contains(l)) {
        return Err("NUTS levels range from 0 to 3".to_string());
    }
    Ok(LevelsArg(levels))
}

/// Parse a comma-separated list of non-empty strings
fn parse_countries(s: &str) -> Result<CountriesArg, String> {
    let items: Vec<String> = s
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if items.is_empty() {
        return Err("At least one entry is required".to_string());
    }
    Ok(CountriesArg(items))
}

/// Parse a bounding box: north,west,south,east
fn parse_bbox(s: &str) -> Result<BboxArg, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err("Bounding box must be in format 'north,west,south,east'".to_string());
    }
    let mut bbox = [0.0f64; 4];
    for (slot, part) in bbox.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|_| "Invalid coordinate in bounding box")?;
    }
    if bbox[0] <= bbox[2] {
        return Err("North must be greater than south".to_string());
    }
    Ok(BboxArg(bbox))
}

/// Parse a year-month: '2020-01' or '2020-1'
fn parse_year_month(s: &str) -> Result<YearMonthArg, String> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 2 {
        return Err("Month must be in format 'YEAR-MONTH', e.g. '2020-01'".to_string());
    }
    let year = parts[0]
        .parse::<i32>()
        .map_err(|_| "Invalid year".to_string())?;
    let month = parts[1]
        .parse::<u32>()
        .map_err(|_| "Invalid month".to_string())?;
    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12".to_string());
    }
    Ok(YearMonthArg { year, month })
}
