//! # Input Configuration Module
//!
//! This module provides configuration parsing for nc2nuts aggregation jobs.
//! It handles JSON and YAML configuration files that specify the NetCDF
//! input, the administrative boundary file, and the output destination.
//!
//! ## Configuration Structure
//!
//! A configuration file specifies:
//! - **nc_key**: Path to the input NetCDF file
//! - **regions_key**: Path to the NUTS boundary GeoJSON file
//! - **output_key**: Path for the output table (Parquet or CSV)
//! - **levels**: NUTS levels to aggregate onto (default `[3]`)
//! - **countries**: Optional country-code filter
//! - **workers**: Worker threads for the region loop (default 1)
//! - **eurostat_dataset**: Optional Eurostat dataset code to join afterwards
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nc2nuts::input::JobConfig;
//!
//! // Load from file (format chosen by extension)
//! let config = JobConfig::from_file("job.json")?;
//!
//! // Load from a JSON string
//! let json = r#"
//! {
//!   "nc_key": "ERA_land_weekly.nc",
//!   "regions_key": "NUTS_RG_01M_2021_4326.geojson",
//!   "output_key": "weekly_by_region.parquet"
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

fn default_levels() -> Vec<i64> {
    vec![3]
}

fn default_workers() -> usize {
    1
}

/// Main configuration structure for nc2nuts aggregation jobs.
///
/// # Examples
///
/// ```rust
/// use nc2nuts::input::JobConfig;
///
/// let config = JobConfig {
///     nc_key: "ERA_land_weekly.nc".to_string(),
///     regions_key: "NUTS_RG_01M_2021_4326.geojson".to_string(),
///     output_key: "weekly_by_region.parquet".to_string(),
///     levels: vec![3],
///     countries: Some(vec!["EL".to_string()]),
///     workers: 4,
///     eurostat_dataset: None,
/// };
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct JobConfig {
    /// Path to the input NetCDF file
    pub nc_key: String,
    /// Path to the NUTS boundary GeoJSON file
    pub regions_key: String,
    /// Path for the output table (Parquet or CSV, chosen by extension)
    pub output_key: String,
    /// NUTS levels to aggregate onto
    #[serde(default = "default_levels")]
    pub levels: Vec<i64>,
    /// Country codes to keep; `None` keeps every country
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    /// Worker threads for the per-region loop
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Eurostat dataset code to fetch and join after aggregation
    #[serde(default)]
    pub eurostat_dataset: Option<String>,
}

impl JobConfig {
    /// Loads a job configuration from a file.
    ///
    /// The format is chosen by extension: `.yaml`/`.yml` parses as YAML,
    /// anything else as JSON.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use nc2nuts::input::JobConfig;
    ///
    /// let config = JobConfig::from_file("job.yaml")?;
    /// println!("Aggregating {}", config.nc_key);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Loads a job configuration from a JSON string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nc2nuts::input::JobConfig;
    ///
    /// let json = r#"
    /// {
    ///   "nc_key": "data.nc",
    ///   "regions_key": "nuts.geojson",
    ///   "output_key": "out.parquet"
    /// }"#;
    /// let config = JobConfig::from_json(json)?;
    /// assert_eq!(config.levels, vec![3]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_json(json_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: JobConfig = serde_json::from_str(json_str)?;
        Ok(config)
    }

    /// Loads a job configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: JobConfig = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }
}
