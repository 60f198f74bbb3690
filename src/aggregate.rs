//! # Per-Region Aggregation
//!
//! Combines the cell weights with the raster table to produce one
//! area-weighted row per (region, time step): every variable column is
//! multiplied by the cell's normalized weight, then summed across cells per
//! time step.
//!
//! The per-region computation is independent across regions and can fan out
//! over a fixed-size worker pool. Each region's failure is captured as an
//! individual outcome; one bad region never aborts the batch.

use crate::grid::{CellGrid, GridError};
use crate::raster::{RasterError, RasterTable};
use crate::regions::{Region, RegionSet};
use crate::weights::cell_weights;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use polars::prelude::*;
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;

/// Errors raised during region aggregation
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("worker pool could not be built: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Result of aggregating one region
#[derive(Debug, Clone)]
pub struct RegionOutcome {
    pub nuts_id: String,
    /// Rows produced for this region (0 when no cell intersects it)
    pub rows: usize,
    /// Failure cause, when the region could not be aggregated
    pub error: Option<String>,
}

impl RegionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The concatenated aggregate plus the per-region outcome summary
#[derive(Debug)]
pub struct AggregationReport {
    /// Columns: `time`, one column per climate variable, `nuts_id`
    pub df: DataFrame,
    pub outcomes: Vec<RegionOutcome>,
}

impl AggregationReport {
    pub fn failed(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Aggregates the raster onto a single region.
///
/// The weights table is inner-joined onto the raster rows by the
/// millidegree coordinate keys, so cells outside the region drop out before
/// renormalized weighting. A region with no intersecting cells produces an
/// empty frame. Masked (null) cell values are skipped by the sum, so an
/// ocean-masked cell contributes nothing rather than a fill constant.
pub fn aggregate_region(
    region: &Region,
    raster: &RasterTable,
    grid: &CellGrid,
) -> Result<DataFrame, AggregationError> {
    let weights = cell_weights(&region.geometry, grid);
    debug!("Region {}: {} intersecting cells", region.id, weights.len());

    let weights_df = df!(
        "lon_key" => weights.iter().map(|w| w.lon_key).collect::<Vec<_>>(),
        "lat_key" => weights.iter().map(|w| w.lat_key).collect::<Vec<_>>(),
        "weight" => weights.iter().map(|w| w.weight).collect::<Vec<_>>(),
    )?;

    let weighted: Vec<Expr> = raster
        .variables
        .iter()
        .map(|v| (col(v.as_str()) * col("weight")).alias(v.as_str()))
        .collect();
    let summed: Vec<Expr> = raster
        .variables
        .iter()
        .map(|v| col(v.as_str()).sum())
        .collect();

    let df = raster
        .df
        .clone()
        .lazy()
        .join(
            weights_df.lazy(),
            [col("lon_key"), col("lat_key")],
            [col("lon_key"), col("lat_key")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_columns(weighted)
        .group_by([col("time")])
        .agg(summed)
        .with_column(lit(region.id.as_str()).alias("nuts_id"))
        .sort(["time"], SortMultipleOptions::default())
        .collect()?;

    Ok(df)
}

/// Aggregates a raster file onto every region in the set.
///
/// `workers` > 1 fans the regions out over a Rayon pool of that size;
/// otherwise the regions run sequentially. Results are concatenated in
/// whatever order workers finish; `nuts_id` is attached per-row, so order
/// carries no meaning.
pub fn aggregate_all<P: AsRef<Path>>(
    path_nc: P,
    regions: &RegionSet,
    workers: usize,
) -> Result<AggregationReport, AggregationError> {
    let raster = RasterTable::from_file(path_nc)?;
    let grid = CellGrid::from_axes(&raster.lons, &raster.lats)?;

    let bar = ProgressBar::new(regions.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} regions {elapsed}")
            .expect("valid progress template"),
    );

    let run_one = |region: &Region| {
        let result = aggregate_region(region, &raster, &grid);
        bar.inc(1);
        (region.id.clone(), result)
    };

    let results: Vec<(String, Result<DataFrame, AggregationError>)> = if workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        pool.install(|| regions.regions.par_iter().map(run_one).collect())
    } else {
        regions.regions.iter().map(run_one).collect()
    };
    bar.finish_and_clear();

    let mut outcomes = Vec::with_capacity(results.len());
    let mut combined: Option<DataFrame> = None;
    for (nuts_id, result) in results {
        match result {
            Ok(df) => {
                outcomes.push(RegionOutcome {
                    nuts_id,
                    rows: df.height(),
                    error: None,
                });
                if df.height() > 0 {
                    combined = Some(match combined.take() {
                        Some(mut acc) => {
                            acc.vstack_mut(&df)?;
                            acc
                        }
                        None => df,
                    });
                }
            }
            Err(e) => {
                warn!("Region {} failed to aggregate: {}", nuts_id, e);
                outcomes.push(RegionOutcome {
                    nuts_id,
                    rows: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(AggregationReport {
        df: combined.unwrap_or_default(),
        outcomes,
    })
}
