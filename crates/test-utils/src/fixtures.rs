//! Reference fixtures for zonal statistics tests.
//!
//! A 4x4 grid whose pixel centres run from -1 to 1 on both axes, with
//! values 1..=16 on the first date and 17..=32 on the second, overlaid
//! by three admin polygons:
//!
//! ```text
//!          col 0  col 1  col 2  col 3
//! row 0  [    1,     2,     3,     4 ]
//! row 1  [    5,     6,  R  7,     8 ]
//! row 2  [    9, L  10,  R 11,    12 ]
//! row 3  [   13,    14,    15,    16 ]
//! ```
//!
//! `LEFT` covers one pixel centre, `RIGHT` two and `TOP` none.

use chrono::NaiveDate;
use geo::{polygon, Polygon};
use ndarray::{Array3, Array4};
use raster_common::{AdminLayer, AdminPolygon, AffineTransform, CrsCode, RasterGrid};

pub const FIXTURE_ISO3: &str = "ABC";
pub const FIXTURE_ADM_LEVEL: u8 = 1;

/// Side length of the fixture grid.
pub const FIXTURE_SIZE: usize = 4;

/// The two dates of the observational fixture grid.
pub fn fixture_dates() -> Vec<NaiveDate> {
    vec![ymd(2024, 1, 1), ymd(2024, 1, 2)]
}

/// Pixel-centre coordinates: `linspace(-1, 1, 4)` for x, reversed for y.
pub fn fixture_coords() -> (Vec<f64>, Vec<f64>) {
    let step = 2.0 / (FIXTURE_SIZE - 1) as f64;
    let xs: Vec<f64> = (0..FIXTURE_SIZE).map(|i| -1.0 + step * i as f64).collect();
    let ys: Vec<f64> = xs.iter().rev().copied().collect();
    (xs, ys)
}

pub fn fixture_transform() -> AffineTransform {
    let (xs, ys) = fixture_coords();
    AffineTransform::from_centers(&xs, &ys).expect("fixture coordinates are regular")
}

/// Observational 4x4 grid over two dates.
pub fn fixture_grid() -> RasterGrid {
    let n = FIXTURE_SIZE * FIXTURE_SIZE;
    let data = Array3::from_shape_fn((2, FIXTURE_SIZE, FIXTURE_SIZE), |(d, row, col)| {
        (d * n + row * FIXTURE_SIZE + col + 1) as f64
    });
    RasterGrid::observational(fixture_dates(), data, fixture_transform(), CrsCode::Epsg4326)
        .expect("fixture grid is well formed")
}

/// Forecast months in [`fixture_forecast_grid`].
pub const FIXTURE_LEADTIMES: [u32; 3] = [0, 1, 2];

/// Forecast grid with two monthly dates and three leadtimes.
///
/// Slice `(d, l)` holds `1..=16` shifted by `16 * (d * 3 + l)`, except
/// `(2024-03-01, 2)` and `(2024-04-01, 0)`, which are entirely NaN.
pub fn fixture_forecast_grid() -> RasterGrid {
    let n = FIXTURE_SIZE * FIXTURE_SIZE;
    let n_leads = FIXTURE_LEADTIMES.len();
    let empty = [(0, 2), (1, 0)];
    let data = Array4::from_shape_fn(
        (2, n_leads, FIXTURE_SIZE, FIXTURE_SIZE),
        |(d, l, row, col)| {
            if empty.contains(&(d, l)) {
                f64::NAN
            } else {
                ((d * n_leads + l) * n + row * FIXTURE_SIZE + col + 1) as f64
            }
        },
    );
    RasterGrid::forecast(
        vec![ymd(2024, 3, 1), ymd(2024, 4, 1)],
        FIXTURE_LEADTIMES.to_vec(),
        data,
        fixture_transform(),
        CrsCode::Epsg4326,
    )
    .expect("fixture forecast grid is well formed")
}

pub fn left_polygon() -> Polygon<f64> {
    polygon![
        (x: -1.0, y: -1.0),
        (x: -0.5, y: -0.8),
        (x: 0.0, y: -0.5),
        (x: -0.2, y: 0.0),
        (x: -0.8, y: 0.2),
        (x: -1.0, y: 0.5)
    ]
}

/// Sits between pixel centres, so the centre rule labels nothing.
pub fn top_polygon() -> Polygon<f64> {
    polygon![
        (x: -0.2, y: 0.2),
        (x: 0.2, y: 0.5),
        (x: 0.0, y: 1.0),
        (x: -0.5, y: 0.8)
    ]
}

pub fn right_polygon() -> Polygon<f64> {
    polygon![
        (x: 0.2, y: -1.0),
        (x: 1.0, y: -0.8),
        (x: 0.8, y: 0.0),
        (x: 1.0, y: 0.5),
        (x: 0.5, y: 0.8),
        (x: 0.0, y: 0.2)
    ]
}

/// LEFT, TOP, RIGHT in that order.
pub fn fixture_layer() -> AdminLayer {
    layer_of(vec![
        AdminPolygon::new("LEFT", left_polygon()),
        AdminPolygon::new("TOP", top_polygon()),
        AdminPolygon::new("RIGHT", right_polygon()),
    ])
}

/// LEFT, RIGHT, TOP: the uncovered polygon is last.
pub fn fixture_layer_uncovered_last() -> AdminLayer {
    layer_of(vec![
        AdminPolygon::new("LEFT", left_polygon()),
        AdminPolygon::new("RIGHT", right_polygon()),
        AdminPolygon::new("TOP", top_polygon()),
    ])
}

fn layer_of(polygons: Vec<AdminPolygon>) -> AdminLayer {
    AdminLayer::new(FIXTURE_ISO3, FIXTURE_ADM_LEVEL, CrsCode::Epsg4326, polygons)
        .expect("fixture layer is not empty")
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_transform_matches_coords() {
        let t = fixture_transform();
        let (cx, cy) = t.pixel_center(1, 2);
        assert!((cx - (-1.0 / 3.0)).abs() < 1e-12);
        assert!((cy - (-1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_fixture_grid_values() {
        let grid = fixture_grid();
        let slices: Vec<_> = grid.slices().collect();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].values[[2, 1]], 10.0);
        assert_eq!(slices[1].values[[3, 3]], 32.0);
    }

    #[test]
    fn test_forecast_fixture_has_empty_slices() {
        let grid = fixture_forecast_grid();
        let empty = grid.slices().filter(|s| s.is_all_nan()).count();
        assert_eq!(grid.slice_count(), 6);
        assert_eq!(empty, 2);
    }
}
