//! Affine pixel/world transforms.
//!
//! Coefficients follow the GDAL/rasterio convention:
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```
//!
//! where `(col, row)` addresses the upper-left corner of a pixel, so the
//! pixel centre is `(col + 0.5, row + 0.5)`.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, RasterError, RasterResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform covering `(west, south, east, north)` with
    /// `width` x `height` pixels.
    pub fn from_bounds(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        width: usize,
        height: usize,
    ) -> RasterResult<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::invalid_transform(format!(
                "cannot derive transform for {}x{} grid",
                width, height
            )));
        }
        let transform = Self::new(
            (east - west) / width as f64,
            0.0,
            west,
            0.0,
            (south - north) / height as f64,
            north,
        );
        transform.validate()?;
        Ok(transform)
    }

    /// Transform from evenly spaced pixel-centre coordinates.
    ///
    /// `xs` runs west to east and `ys` usually north to south, as found
    /// on the coordinate variables of a gridded dataset.
    pub fn from_centers(xs: &[f64], ys: &[f64]) -> RasterResult<Self> {
        if xs.len() < 2 || ys.len() < 2 {
            return Err(RasterError::invalid_transform(
                "at least two coordinates per axis are needed to infer resolution",
            ));
        }
        let res_x = (xs[xs.len() - 1] - xs[0]) / (xs.len() - 1) as f64;
        let res_y = (ys[ys.len() - 1] - ys[0]) / (ys.len() - 1) as f64;

        let transform = Self::new(
            res_x,
            0.0,
            xs[0] - res_x / 2.0,
            0.0,
            res_y,
            ys[0] - res_y / 2.0,
        );
        transform.validate()?;
        Ok(transform)
    }

    /// Build from a GDAL-ordered geotransform `[c, a, b, f, d, e]`.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// GDAL-ordered geotransform `[c, a, b, f, d, e]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Reject transforms that cannot be inverted.
    pub fn validate(&self) -> RasterResult<()> {
        let coeffs = [self.a, self.b, self.c, self.d, self.e, self.f];
        if coeffs.iter().any(|v| !v.is_finite()) {
            return Err(RasterError::invalid_transform(format!(
                "non-finite coefficient in {:?}",
                coeffs
            )));
        }
        if self.determinant().abs() < f64::EPSILON * f64::EPSILON {
            return Err(RasterError::invalid_transform("transform is not invertible"));
        }
        Ok(())
    }

    /// Pixel-space `(col, row)` to world `(x, y)`.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// World `(x, y)` to fractional pixel-space `(col, row)`.
    ///
    /// Callers must have validated the transform.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        let dx = x - self.c;
        let dy = y - self.f;
        (
            (self.e * dx - self.b * dy) / det,
            (-self.d * dx + self.a * dy) / det,
        )
    }

    /// World coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Pixel size as `(x, y)`; `y` is negative for north-up grids.
    pub fn resolution(&self) -> (f64, f64) {
        (self.a, self.e)
    }

    /// Transform for the same extent subdivided by an integer factor.
    pub fn upsampled(&self, factor: usize) -> Self {
        let k = factor as f64;
        Self::new(self.a / k, self.b / k, self.c, self.d / k, self.e / k, self.f)
    }

    /// World extent of a `width` x `height` grid.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(width as f64, 0.0),
            self.apply(0.0, height as f64),
            self.apply(width as f64, height as f64),
        ];
        corners.iter().skip(1).fold(
            BoundingBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1),
            |bbox, &(x, y)| bbox.union(&BoundingBox::new(x, y, x, y)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bounds_north_up() {
        let t = AffineTransform::from_bounds(0.0, 0.0, 3.0, 3.0, 3, 3).unwrap();
        assert_eq!(t.resolution(), (1.0, -1.0));
        assert_eq!(t.apply(0.0, 0.0), (0.0, 3.0));
        assert_eq!(t.pixel_center(0, 0), (0.5, 2.5));
    }

    #[test]
    fn test_from_centers_matches_coordinate_spacing() {
        let xs = [-1.0, -1.0 / 3.0, 1.0 / 3.0, 1.0];
        let ys = [1.0, 1.0 / 3.0, -1.0 / 3.0, -1.0];
        let t = AffineTransform::from_centers(&xs, &ys).unwrap();

        let (cx, cy) = t.pixel_center(1, 2);
        assert!((cx - (-1.0 / 3.0)).abs() < 1e-12);
        assert!((cy - (-1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_to_pixel_inverts_apply() {
        let t = AffineTransform::new(0.5, 0.1, 10.0, 0.05, -0.5, 20.0);
        let (x, y) = t.apply(3.25, 7.5);
        let (col, row) = t.to_pixel(x, y);
        assert!((col - 3.25).abs() < 1e-9);
        assert!((row - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_singular_transform_rejected() {
        let t = AffineTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        assert!(t.validate().is_err());
        assert!(AffineTransform::from_bounds(0.0, 0.0, 1.0, 1.0, 0, 4).is_err());
    }

    #[test]
    fn test_gdal_round_trip_order() {
        let gt = [100.0, 0.25, 0.0, 50.0, 0.0, -0.25];
        let t = AffineTransform::from_gdal(gt);
        assert_eq!(t.a, 0.25);
        assert_eq!(t.f, 50.0);
        assert_eq!(t.to_gdal(), gt);
    }

    #[test]
    fn test_upsampled_keeps_extent() {
        let t = AffineTransform::from_bounds(0.0, 0.0, 4.0, 4.0, 4, 4).unwrap();
        let up = t.upsampled(2);
        assert_eq!(up.bounds(8, 8), t.bounds(4, 4));
    }
}
