//! # Grid-to-Region Area Weighting
//!
//! The core of the pipeline: for a given region polygon, compute the
//! normalized weight of every grid cell that spatially intersects it.
//!
//! A cell's raw weight is its coverage fraction: the share of the cell's
//! area that falls inside the region. Coverage fractions over a region are
//! renormalized to sum to 1, so the weighted sum of a climate variable over
//! the intersecting cells is a proper spatial average no matter how many
//! partial cells hang over the region's edge.

use crate::grid::{CellGrid, GridCell};
use geo::{Area, BooleanOps, Intersects, MultiPolygon};
use std::collections::HashSet;

/// Normalized weight of one grid cell within one region
#[derive(Debug, Clone, PartialEq)]
pub struct CellWeight {
    pub lon: f64,
    pub lat: f64,
    pub lon_key: i64,
    pub lat_key: i64,
    pub weight: f64,
}

/// Computes the normalized cell weights for a single region.
///
/// Cells with zero intersection area are dropped before renormalization,
/// not assigned zero weight. A region with no intersecting cells yields an
/// empty vector, silently; the caller's join then produces an empty result
/// for that region.
///
/// Duplicate (lon, lat, coverage) triples are collapsed before summing so
/// that overlapping parts of a multi-part geometry cannot double-count a
/// cell.
pub fn cell_weights(region: &MultiPolygon<f64>, grid: &CellGrid) -> Vec<CellWeight> {
    let mut covered: Vec<(&GridCell, f64)> = Vec::new();
    for cell in &grid.cells {
        if !cell.polygon.intersects(region) {
            continue;
        }
        let cell_mp = MultiPolygon::new(vec![cell.polygon.clone()]);
        let area_inter = cell_mp.intersection(region).unsigned_area();
        if area_inter <= 0.0 {
            continue;
        }
        let perc_cover = area_inter / cell.polygon.unsigned_area();
        covered.push((cell, perc_cover));
    }

    let mut seen: HashSet<(i64, i64, u64)> = HashSet::new();
    covered.retain(|(cell, cover)| seen.insert((cell.lon_key, cell.lat_key, cover.to_bits())));

    let total: f64 = covered.iter().map(|(_, cover)| cover).sum();
    if total == 0.0 {
        return Vec::new();
    }

    covered
        .into_iter()
        .map(|(cell, cover)| CellWeight {
            lon: cell.lon,
            lat: cell.lat,
            lon_key: cell.lon_key,
            lat_key: cell.lat_key,
            weight: cover / total,
        })
        .collect()
}

/// Sum of the normalized weights, for consistency checks.
///
/// Equals 1.0 (within floating point) whenever at least one cell intersects
/// the region.
pub fn weight_sum(weights: &[CellWeight]) -> f64 {
    weights.iter().map(|w| w.weight).sum()
}
