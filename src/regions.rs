//! # NUTS Region Boundaries
//!
//! Loads administrative region polygons from a GeoJSON boundary file and
//! subsets them by NUTS level and country code. The boundary file is the
//! GeoJSON export of the Eurostat NUTS shapefile, with `NUTS_ID`,
//! `LEVL_CODE` and `CNTR_CODE` feature properties.

use geo_types::{Geometry, MultiPolygon};
use geojson::GeoJson;
use log::debug;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading region boundaries
#[derive(Error, Debug)]
pub enum RegionError {
    #[error("IO error reading boundary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("boundary file is not valid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("boundary file is not a FeatureCollection")]
    NotFeatureCollection,

    #[error("feature is missing the '{0}' property")]
    MissingProperty(&'static str),

    #[error("feature '{id}' has a non-polygonal geometry")]
    NotPolygonal { id: String },
}

/// One administrative region polygon
#[derive(Debug, Clone)]
pub struct Region {
    /// NUTS identifier, e.g. `"EL301"`
    pub id: String,
    /// NUTS administrative level (0 = country, 3 = finest)
    pub level: i64,
    /// Two-letter country code
    pub country: String,
    pub geometry: MultiPolygon<f64>,
}

/// The subset of regions a job aggregates onto
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    pub regions: Vec<Region>,
}

impl RegionSet {
    /// Reads the NUTS boundary file and subsets for the requested levels and,
    /// when given, the requested countries.
    ///
    /// Features without a geometry are skipped with a debug message; a
    /// feature whose geometry is not a (multi)polygon is an error, since a
    /// non-areal region cannot take part in area weighting.
    pub fn from_geojson_file<P: AsRef<Path>>(
        path: P,
        levels: &[i64],
        countries: Option<&[String]>,
    ) -> Result<Self, RegionError> {
        let content = fs::read_to_string(path)?;
        let geojson: GeoJson = content.parse()?;
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(RegionError::NotFeatureCollection),
        };

        let mut regions = Vec::new();
        for feature in collection.features {
            let id = feature
                .property("NUTS_ID")
                .and_then(|v| v.as_str())
                .ok_or(RegionError::MissingProperty("NUTS_ID"))?
                .to_string();
            let level = feature
                .property("LEVL_CODE")
                .and_then(|v| v.as_i64())
                .ok_or(RegionError::MissingProperty("LEVL_CODE"))?;
            let country = feature
                .property("CNTR_CODE")
                .and_then(|v| v.as_str())
                .ok_or(RegionError::MissingProperty("CNTR_CODE"))?
                .to_string();

            if !levels.contains(&level) {
                continue;
            }
            if let Some(wanted) = countries {
                if !wanted.contains(&country) {
                    continue;
                }
            }

            let Some(geometry) = feature.geometry else {
                debug!("Region {} has no geometry, skipping", id);
                continue;
            };
            let geometry: Geometry<f64> = geometry.try_into()?;
            let geometry = match geometry {
                Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                Geometry::MultiPolygon(mp) => mp,
                _ => return Err(RegionError::NotPolygonal { id }),
            };

            regions.push(Region {
                id,
                level,
                country,
                geometry,
            });
        }

        debug!("Loaded {} regions from boundary file", regions.len());
        Ok(RegionSet { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
