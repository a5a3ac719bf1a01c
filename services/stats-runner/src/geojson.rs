//! GeoJSON admin boundary files.
//!
//! Only the parts needed to build an [`AdminLayer`] are modelled:
//! Polygon and MultiPolygon features carrying an `ADM{level}_PCODE`
//! property. Coordinates are assumed to be EPSG:4326 unless the legacy
//! `crs` member names another code.

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use raster_common::{AdminLayer, AdminPolygon, CrsCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A GeoJSON FeatureCollection of admin units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<NamedCrs>,

    pub features: Vec<Feature>,
}

/// Pre-RFC 7946 `crs` member: `{"type": "name", "properties": {"name": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedCrs {
    pub properties: NamedCrsProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedCrsProperties {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub type_: String,

    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// Areal geometry types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Rings of `[x, y]` positions; the first ring is the exterior.
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },

    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

impl Geometry {
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>> {
        match self {
            Geometry::Polygon { coordinates } => Ok(MultiPolygon::new(vec![polygon(coordinates)?])),
            Geometry::MultiPolygon { coordinates } => Ok(MultiPolygon::new(
                coordinates.iter().map(|p| polygon(p)).collect::<Result<_>>()?,
            )),
        }
    }
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|r| ring(r));
    let exterior = rings.next().ok_or_else(|| anyhow!("polygon has no rings"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => bail!("position needs at least two coordinates, got {:?}", p),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn positions(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

impl FeatureCollection {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse GeoJSON FeatureCollection")
    }

    /// CRS of the coordinates, EPSG:4326 when unspecified.
    pub fn crs_code(&self) -> Result<CrsCode> {
        match &self.crs {
            Some(named) => named
                .properties
                .name
                .parse()
                .map_err(|e| anyhow!("unsupported GeoJSON crs: {}", e)),
            None => Ok(CrsCode::Epsg4326),
        }
    }

    /// Feature collection of a layer, with pcodes under `ADM{level}_PCODE`.
    pub fn from_layer(layer: &AdminLayer) -> Self {
        let column = AdminLayer::pcode_column(layer.adm_level());
        let features = layer
            .polygons()
            .iter()
            .map(|unit| Feature {
                type_: "Feature".to_string(),
                geometry: Some(Geometry::MultiPolygon {
                    coordinates: unit.geometry.0.iter().map(positions).collect(),
                }),
                properties: HashMap::from([(
                    column.clone(),
                    serde_json::Value::String(unit.pcode.clone()),
                )]),
            })
            .collect();

        Self {
            type_: "FeatureCollection".to_string(),
            crs: match layer.crs() {
                CrsCode::Epsg4326 => None,
                other => Some(NamedCrs {
                    properties: NamedCrsProperties {
                        name: other.to_string(),
                    },
                }),
            },
            features,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize FeatureCollection")
    }

    /// Build the layer of one country at one admin level.
    ///
    /// Features keep their file order, which fixes their labels.
    pub fn into_layer(self, iso3: &str, adm_level: u8) -> Result<AdminLayer> {
        let crs = self.crs_code()?;
        let column = AdminLayer::pcode_column(adm_level);

        let polygons = self
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| {
                let pcode = feature
                    .properties
                    .get(&column)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("feature {} has no string {} property", index, column))?
                    .to_string();
                let geometry = feature
                    .geometry
                    .as_ref()
                    .ok_or_else(|| anyhow!("feature {} ({}) has no geometry", index, pcode))?
                    .to_multi_polygon()
                    .with_context(|| format!("feature {} ({})", index, pcode))?;
                Ok(AdminPolygon::new(pcode, geometry))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AdminLayer::new(iso3, adm_level, crs, polygons)?)
    }
}
