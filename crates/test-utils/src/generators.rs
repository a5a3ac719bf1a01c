//! Generators for synthetic grids and polygon layers.
//!
//! These produce predictable, verifiable data that can be used across the
//! test suite.

use chrono::NaiveDate;
use geo::{polygon, Polygon};
use ndarray::{Array2, Array3};
use raster_common::{AdminLayer, AdminPolygon, AffineTransform, CrsCode, RasterGrid};

/// Creates a slice with predictable values.
///
/// Each cell value is `start + row * width + col`.
///
/// # Example
///
/// ```
/// use test_utils::sequential_slice;
///
/// let slice = sequential_slice(3, 2, 1.0);
/// assert_eq!(slice[[0, 0]], 1.0);
/// assert_eq!(slice[[1, 2]], 6.0);
/// ```
pub fn sequential_slice(width: usize, height: usize, start: f64) -> Array2<f64> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        start + (row * width + col) as f64
    })
}

/// Axis-aligned rectangle from `(x0, y0)` to `(x1, y1)`.
pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
}

/// Transform of a `width` x `height` grid with one-unit pixels covering
/// `[0, width] x [0, height]`.
pub fn unit_transform(width: usize, height: usize) -> AffineTransform {
    AffineTransform::from_bounds(0.0, 0.0, width as f64, height as f64, width, height)
        .expect("unit grid has non-zero size")
}

/// `n` unit squares side by side, each covering exactly one pixel of an
/// `n x 1` unit grid. Pcodes are `SQ0`, `SQ1`, ...
pub fn unit_square_layer(iso3: &str, adm_level: u8, n: usize) -> AdminLayer {
    let polygons = (0..n)
        .map(|i| {
            let x = i as f64;
            AdminPolygon::new(format!("SQ{}", i), rect(x, 0.0, x + 1.0, 1.0))
        })
        .collect();
    AdminLayer::new(iso3, adm_level, CrsCode::Epsg4326, polygons)
        .expect("unit square layer is not empty")
}

/// Observational grid on the unit transform with the same `value` everywhere.
pub fn constant_grid(width: usize, height: usize, dates: Vec<NaiveDate>, value: f64) -> RasterGrid {
    let data = Array3::from_elem((dates.len(), height, width), value);
    RasterGrid::observational(dates, data, unit_transform(width, height), CrsCode::Epsg4326)
        .expect("constant grid is well formed")
}
