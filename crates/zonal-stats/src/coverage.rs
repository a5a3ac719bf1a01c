//! How much of each raw pixel every polygon covers.
//!
//! The raw grid is split into `factor x factor` sub-pixels and each raw
//! pixel gets a distinct id, replicated to its sub-pixels. Rasterizing the
//! layer with `all_touched` on the fine grid and reducing the id raster
//! gives, per polygon, the number of distinct raw pixels it touches and
//! the number of sub-pixels it covers.

use ndarray::Array2;
use raster_common::{AdminLayer, GridGeometry};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZonalError};
use crate::rasterize::Rasterizer;
use crate::reducer::reduce;
use crate::stats::{Stat, StatSet};

/// Coverage of one polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonCoverage {
    pub pcode: String,
    /// Distinct raw pixels touched by the polygon.
    pub n_intersect_raw_pixels: u64,
    /// Sub-pixels labelled with the polygon on the upsampled grid.
    pub n_upsampled_pixels: u64,
    /// `n_upsampled_pixels / factor²`, the polygon area in raw-pixel units.
    pub frac_raw_pixels: f64,
}

/// Coverage of every polygon of `layer` on `grid`, in layer order.
pub fn polygon_coverage(
    layer: &AdminLayer,
    grid: &GridGeometry,
    upscale_factor: usize,
    rasterizer: &Rasterizer,
) -> Result<Vec<PolygonCoverage>> {
    if upscale_factor == 0 {
        return Err(ZonalError::config("upscale factor must be > 0"));
    }

    let fine = grid.upsampled(upscale_factor);
    let ids = Array2::from_shape_fn((fine.height, fine.width), |(row, col)| {
        ((row / upscale_factor) * grid.width + col / upscale_factor) as f64
    });

    let touched = Rasterizer {
        all_touched: true,
        ..*rasterizer
    };
    let labels = touched.rasterize_layer(layer, &fine)?;
    let zones = reduce(
        ids.view(),
        &labels,
        Some(layer.len()),
        &StatSet::new([Stat::Unique, Stat::Count]),
    )?;

    let sub_pixels = (upscale_factor * upscale_factor) as f64;
    layer
        .polygons()
        .iter()
        .zip(zones)
        .map(|(polygon, zone)| {
            let count = zone.count.unwrap_or(0);
            Ok(PolygonCoverage {
                pcode: polygon.pcode.clone(),
                n_intersect_raw_pixels: zone.unique.unwrap_or(0),
                n_upsampled_pixels: count,
                frac_raw_pixels: count as f64 / sub_pixels,
            })
        })
        .collect()
}
