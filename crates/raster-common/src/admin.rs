//! Administrative boundary collections.

use geo::{BoundingRect, MultiPolygon};
use std::collections::HashSet;

use crate::{BoundingBox, CrsCode, RasterError, RasterResult};

/// Highest admin level a country may be subdivided to.
pub const MAX_ADM_LEVEL: u8 = 4;

/// One administrative unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminPolygon {
    /// Unique code within its (iso3, admin level).
    pub pcode: String,
    pub geometry: MultiPolygon<f64>,
}

impl AdminPolygon {
    pub fn new(pcode: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            pcode: pcode.into(),
            geometry: geometry.into(),
        }
    }
}

/// All polygons of one country at one admin level.
///
/// A polygon's position in the layer is its label in rasterized form, so
/// the order is fixed once the layer is built. Pcodes are unique within
/// a layer.
#[derive(Debug, Clone)]
pub struct AdminLayer {
    iso3: String,
    adm_level: u8,
    crs: CrsCode,
    polygons: Vec<AdminPolygon>,
}

impl AdminLayer {
    pub fn new(
        iso3: impl Into<String>,
        adm_level: u8,
        crs: CrsCode,
        polygons: Vec<AdminPolygon>,
    ) -> RasterResult<Self> {
        let iso3 = iso3.into();
        if polygons.is_empty() {
            return Err(RasterError::EmptyLayer { iso3, adm_level });
        }
        let duplicate = {
            let mut seen = HashSet::with_capacity(polygons.len());
            polygons
                .iter()
                .find(|p| !seen.insert(p.pcode.as_str()))
                .map(|p| p.pcode.clone())
        };
        if let Some(pcode) = duplicate {
            return Err(RasterError::DuplicatePcode {
                iso3,
                adm_level,
                pcode,
            });
        }
        Ok(Self {
            iso3,
            adm_level,
            crs,
            polygons,
        })
    }

    /// Name of the pcode attribute for an admin level, e.g. `ADM1_PCODE`.
    pub fn pcode_column(adm_level: u8) -> String {
        format!("ADM{}_PCODE", adm_level)
    }

    pub fn iso3(&self) -> &str {
        &self.iso3
    }

    pub fn adm_level(&self) -> u8 {
        self.adm_level
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn polygons(&self) -> &[AdminPolygon] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Pcode of the polygon at a positional label.
    pub fn pcode(&self, index: usize) -> Option<&str> {
        self.polygons.get(index).map(|p| p.pcode.as_str())
    }

    /// Combined extent of every polygon.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.polygons
            .iter()
            .filter_map(|p| p.geometry.bounding_rect())
            .map(BoundingBox::from)
            .reduce(|acc, b| acc.union(&b))
    }
}
