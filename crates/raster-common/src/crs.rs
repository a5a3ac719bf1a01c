//! Coordinate reference system codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RasterError;

/// CRS identifier attached to grids and boundary layers.
///
/// Rasters and polygons are only compared by code; reprojection happens
/// before data reaches this workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    #[default]
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// World Mollweide (equal area, meters)
    Esri54009,
    /// Any other EPSG code
    Epsg(u32),
}

impl CrsCode {
    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl FromStr for CrsCode {
    type Err = RasterError;

    /// Parses "EPSG:4326", "epsg:3857", "CRS:84" or "ESRI:54009".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "ESRI:54009" => Ok(CrsCode::Esri54009),
            other => other
                .strip_prefix("EPSG:")
                .and_then(|code| code.parse::<u32>().ok())
                .map(CrsCode::Epsg)
                .ok_or_else(|| RasterError::InvalidCrs(s.to_string())),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsCode::Epsg4326 => write!(f, "EPSG:4326"),
            CrsCode::Epsg3857 => write!(f, "EPSG:3857"),
            CrsCode::Esri54009 => write!(f, "ESRI:54009"),
            CrsCode::Epsg(code) => write!(f, "EPSG:{}", code),
        }
    }
}
