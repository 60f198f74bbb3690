//! # Grid Cell Geometry
//!
//! This module derives the square-cell geometry of a regular lon/lat raster.
//! Every grid point becomes a square polygon centred on that point, with a
//! half-width equal to half the grid spacing. The cell polygons are what the
//! area-weighting step intersects with the NUTS region polygons.
//!
//! ## Key Components
//!
//! - [`half_spacing`]: derives the cell half-width from the latitude axis
//! - [`square_cell`]: builds one cell polygon, repairing degenerate rings
//! - [`CellGrid`]: the cartesian product of the coordinate axes

use geo::{Area, ConvexHull, Coord, LineString, MultiPoint, Point, Polygon};
use thiserror::Error;

/// Errors raised while constructing grid geometry
#[derive(Error, Debug)]
pub enum GridError {
    #[error("latitude axis must contain at least two coordinates, got {0}")]
    DegenerateAxis(usize),

    #[error("grid spacing is zero (repeated latitude coordinate)")]
    ZeroSpacing,
}

/// Rounds a coordinate to three decimal places.
///
/// Three decimals is the precision used for the join key between cell
/// centroids and the raster value table.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Integer millidegree key for a coordinate.
///
/// Joining on floats rounded to three decimals is exact only by accident;
/// the integer key makes it exact by construction. The rounded float columns
/// are still carried alongside for output.
pub fn coord_key(x: f64) -> i64 {
    (x * 1000.0).round() as i64
}

/// Derives half the grid spacing from consecutive latitude coordinates.
///
/// `offset = |lat[1] - lat[0]| / 2`, rounded to 3 decimals. The spacing is
/// assumed uniform, and the longitude spacing is assumed equal to the
/// latitude spacing. That is not geodetically correct near the poles or for
/// non-square grids, but it holds for the reanalysis grids this pipeline
/// consumes.
pub fn half_spacing(lats: &[f64]) -> Result<f64, GridError> {
    if lats.len() < 2 {
        return Err(GridError::DegenerateAxis(lats.len()));
    }
    let offset = round3((lats[1] - lats[0]).abs() / 2.0);
    if offset == 0.0 {
        return Err(GridError::ZeroSpacing);
    }
    Ok(offset)
}

/// Builds a square cell polygon centred at `(lon, lat)` with half-width
/// `offset`.
///
/// The ring is closed counter-clockwise. If the constructed ring is
/// degenerate anyway (its area does not match a square of side
/// `2 * offset`), it is repaired by taking the convex hull of the corners
/// rather than rejected.
pub fn square_cell(lon: f64, lat: f64, offset: f64) -> Polygon<f64> {
    let corners = [
        (lon - offset, lat - offset),
        (lon + offset, lat - offset),
        (lon + offset, lat + offset),
        (lon - offset, lat + offset),
    ];
    let polygon = Polygon::new(
        LineString::from(corners.iter().map(|&(x, y)| Coord { x, y }).collect::<Vec<_>>()),
        vec![],
    );

    let expected = (2.0 * offset) * (2.0 * offset);
    if (polygon.unsigned_area() - expected).abs() > 1e-9 * expected.max(1.0) {
        let points: MultiPoint<f64> = corners
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect::<Vec<_>>()
            .into();
        return points.convex_hull();
    }
    polygon
}

/// One raster pixel's spatial footprint.
#[derive(Debug, Clone)]
pub struct GridCell {
    /// Centre longitude rounded to 3 decimals
    pub lon: f64,
    /// Centre latitude rounded to 3 decimals
    pub lat: f64,
    /// Millidegree join key for the longitude
    pub lon_key: i64,
    /// Millidegree join key for the latitude
    pub lat_key: i64,
    /// Square footprint of the cell
    pub polygon: Polygon<f64>,
}

/// The full set of cell polygons for a raster, one per (lon, lat) pair.
#[derive(Debug, Clone)]
pub struct CellGrid {
    pub cells: Vec<GridCell>,
    /// Half the grid spacing, as derived by [`half_spacing`]
    pub offset: f64,
}

impl CellGrid {
    /// Builds the cell grid from the raster's coordinate axes.
    ///
    /// Every combination of longitude and latitude becomes one cell. The
    /// centre coordinates are rounded to 3 decimals; they are the join key
    /// back into the raster value table.
    pub fn from_axes(lons: &[f64], lats: &[f64]) -> Result<Self, GridError> {
        let offset = half_spacing(lats)?;
        let mut cells = Vec::with_capacity(lons.len() * lats.len());
        for &lon in lons {
            for &lat in lats {
                cells.push(GridCell {
                    lon: round3(lon),
                    lat: round3(lat),
                    lon_key: coord_key(lon),
                    lat_key: coord_key(lat),
                    polygon: square_cell(lon, lat, offset),
                });
            }
        }
        Ok(CellGrid { cells, offset })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
