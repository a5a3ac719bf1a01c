//! Admin Rasterizer: burn polygon indices into a label grid.
//!
//! Rasterization works in pixel space. Each polygon is filled with the
//! even-odd rule over all of its rings, sampling each row at the pixel
//! centre. A pixel is labelled when its centre lies strictly right of a
//! left crossing and at or left of the matching right crossing, which
//! agrees with GDAL's default (non all-touched) mode. Later polygons
//! overwrite earlier ones where they overlap.

use geo::{LineString, MultiPolygon, SimplifyVwPreserve};
use ndarray::Array2;
use raster_common::{AdminLayer, AffineTransform, GridGeometry};
use tracing::debug;

use crate::error::{Result, ZonalError};

/// Slack, in pixels, when comparing pixel centres against crossings.
const CENTER_EPS: f64 = 1e-9;

/// Integer label per pixel, `fill` where no polygon was burned.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRaster {
    data: Array2<i64>,
    fill: i64,
}

impl LabelRaster {
    /// Wrap an existing label array.
    pub fn new(data: Array2<i64>, fill: i64) -> Self {
        Self { data, fill }
    }

    pub fn filled(height: usize, width: usize, fill: i64) -> Self {
        Self::new(Array2::from_elem((height, width), fill), fill)
    }

    pub fn data(&self) -> &Array2<i64> {
        &self.data
    }

    pub fn fill(&self) -> i64 {
        self.fill
    }

    /// `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i64> {
        self.data.get((row, col)).copied()
    }

    /// Number of pixels carrying a label.
    pub fn labelled_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != self.fill).count()
    }

    fn burn(&mut self, row: i64, col: i64, value: i64) {
        if row < 0 || col < 0 {
            return;
        }
        if let Some(cell) = self.data.get_mut((row as usize, col as usize)) {
            *cell = value;
        }
    }
}

/// Burn each polygon's position in `polygons` into a `height` x `width`
/// label grid.
///
/// With `all_touched` every pixel crossed by a polygon boundary is
/// labelled as well.
pub fn rasterize(
    polygons: &[MultiPolygon<f64>],
    width: usize,
    height: usize,
    transform: &AffineTransform,
    fill: i64,
    all_touched: bool,
) -> Result<LabelRaster> {
    if width == 0 || height == 0 {
        return Err(ZonalError::rasterize(format!(
            "cannot rasterize onto a {}x{} grid",
            width, height
        )));
    }
    transform.validate()?;
    if fill >= 0 && (fill as usize) < polygons.len() {
        return Err(ZonalError::rasterize(format!(
            "fill value {} collides with a polygon index",
            fill
        )));
    }

    let mut raster = LabelRaster::filled(height, width, fill);
    for (index, polygon) in polygons.iter().enumerate() {
        let rings = pixel_rings(polygon, transform);
        let label = index as i64;
        fill_even_odd(&mut raster, &rings, label);
        if all_touched {
            for ring in &rings {
                for pair in ring.windows(2) {
                    traverse_segment(pair[0], pair[1], width, height, |col, row| {
                        raster.burn(row, col, label)
                    });
                }
            }
        }
    }
    Ok(raster)
}

fn pixel_rings(polygon: &MultiPolygon<f64>, transform: &AffineTransform) -> Vec<Vec<(f64, f64)>> {
    let to_pixels = |ring: &LineString<f64>| -> Vec<(f64, f64)> {
        ring.coords().map(|c| transform.to_pixel(c.x, c.y)).collect()
    };
    polygon
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
        .map(to_pixels)
        .filter(|ring| ring.len() >= 2)
        .collect()
}

fn fill_even_odd(raster: &mut LabelRaster, rings: &[Vec<(f64, f64)>], label: i64) {
    let (height, width) = raster.shape();
    let (min_y, max_y) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }

    let first_row = ((min_y - 0.5).floor().max(0.0)) as usize;
    let last_row = ((max_y - 0.5).ceil().min(height as f64 - 1.0)).max(-1.0);
    if last_row < 0.0 {
        return;
    }

    let mut crossings = Vec::new();
    for row in first_row..=(last_row as usize) {
        let scan_y = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            // Rings from geo are closed, so consecutive pairs cover every edge.
            for pair in ring.windows(2) {
                let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
                if y1 == y2 {
                    continue;
                }
                if y1.min(y2) <= scan_y && scan_y < y1.max(y2) {
                    crossings.push(x1 + (scan_y - y1) * (x2 - x1) / (y2 - y1));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let first_col = (span[0] + CENTER_EPS - 0.5).floor() as i64 + 1;
            let last_col = (span[1] + CENTER_EPS - 0.5).floor() as i64;
            let first_col = first_col.max(0);
            let last_col = last_col.min(width as i64 - 1);
            for col in first_col..=last_col {
                raster.burn(row as i64, col, label);
            }
        }
    }
}

/// Visit every pixel a segment passes through (Amanatides-Woo traversal).
///
/// The segment is clipped to a one-pixel margin around the grid first so
/// far-away geometry costs nothing.
fn traverse_segment(
    start: (f64, f64),
    end: (f64, f64),
    width: usize,
    height: usize,
    mut visit: impl FnMut(i64, i64),
) {
    let bounds = (-1.0, -1.0, width as f64 + 1.0, height as f64 + 1.0);
    let Some((p0, p1)) = clip_segment(start, end, bounds) else {
        return;
    };

    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let (mut col, mut row) = (p0.0.floor() as i64, p0.1.floor() as i64);
    let (end_col, end_row) = (p1.0.floor() as i64, p1.1.floor() as i64);

    let axis = |origin: f64, cell: i64, delta: f64| -> (i64, f64, f64) {
        if delta > 0.0 {
            (1, ((cell + 1) as f64 - origin) / delta, 1.0 / delta)
        } else if delta < 0.0 {
            (-1, (cell as f64 - origin) / delta, -1.0 / delta)
        } else {
            (0, f64::INFINITY, f64::INFINITY)
        }
    };
    let (step_col, mut t_max_col, t_delta_col) = axis(p0.0, col, dx);
    let (step_row, mut t_max_row, t_delta_row) = axis(p0.1, row, dy);

    visit(col, row);
    let steps = (end_col - col).abs() + (end_row - row).abs();
    for _ in 0..steps {
        if t_max_col < t_max_row {
            col += step_col;
            t_max_col += t_delta_col;
        } else {
            row += step_row;
            t_max_row += t_delta_row;
        }
        visit(col, row);
    }
}

/// Liang-Barsky clipping against `(min_x, min_y, max_x, max_y)`.
fn clip_segment(
    p0: (f64, f64),
    p1: (f64, f64),
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let edges = [
        (-dx, p0.0 - min_x),
        (dx, max_x - p0.0),
        (-dy, p0.1 - min_y),
        (dy, max_y - p0.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        (p0.0 + t0 * dx, p0.1 + t0 * dy),
        (p0.0 + t1 * dx, p0.1 + t1 * dy),
    ))
}

/// Rasterizes admin layers onto a grid with fixed settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rasterizer {
    /// Topology-preserving simplification tolerance in CRS units; 0 disables it.
    pub simplify_tolerance: f64,
    pub all_touched: bool,
    pub fill: i64,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.001,
            all_touched: false,
            fill: -1,
        }
    }
}

impl Rasterizer {
    /// Rasterize a layer onto a grid geometry, labelling each polygon with
    /// its position in the layer.
    pub fn rasterize_layer(&self, layer: &AdminLayer, grid: &GridGeometry) -> Result<LabelRaster> {
        if layer.crs() != grid.crs {
            return Err(ZonalError::CrsMismatch {
                raster: grid.crs.to_string(),
                polygons: layer.crs().to_string(),
            });
        }
        if !(self.simplify_tolerance >= 0.0) {
            return Err(ZonalError::config(format!(
                "simplify tolerance must be >= 0, got {}",
                self.simplify_tolerance
            )));
        }

        let geometries: Vec<MultiPolygon<f64>> = layer
            .polygons()
            .iter()
            .map(|p| self.simplify(&p.geometry))
            .collect();

        let raster = rasterize(
            &geometries,
            grid.width,
            grid.height,
            &grid.transform,
            self.fill,
            self.all_touched,
        )?;

        debug!(
            iso3 = %layer.iso3(),
            adm_level = layer.adm_level(),
            polygons = layer.len(),
            labelled_pixels = raster.labelled_pixels(),
            "Rasterized admin layer"
        );
        Ok(raster)
    }

    fn simplify(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        if self.simplify_tolerance == 0.0 {
            return geometry.clone();
        }
        // Visvalingam works on triangle areas, so the distance tolerance is squared.
        let epsilon = self.simplify_tolerance * self.simplify_tolerance;
        geometry.simplify_vw_preserve(&epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};
    use raster_common::CrsCode;

    fn unit_grid(width: usize, height: usize) -> AffineTransform {
        AffineTransform::from_bounds(0.0, 0.0, width as f64, height as f64, width, height).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    #[test]
    fn test_unit_squares_burn_one_pixel_each() {
        let polygons: Vec<MultiPolygon<f64>> =
            (0..4).map(|i| rect(i as f64, 0.0, i as f64 + 1.0, 1.0).into()).collect();
        let raster = rasterize(&polygons, 4, 1, &unit_grid(4, 1), -1, false).unwrap();
        assert_eq!(raster.data().row(0).to_vec(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_centre_rule_skips_small_polygon() {
        // Covers most of the pixel but not its centre.
        let polygons = vec![rect(0.0, 0.0, 0.45, 1.0).into()];
        let raster = rasterize(&polygons, 2, 1, &unit_grid(2, 1), -1, false).unwrap();
        assert_eq!(raster.labelled_pixels(), 0);

        let touched = rasterize(&polygons, 2, 1, &unit_grid(2, 1), -1, true).unwrap();
        assert_eq!(touched.get(0, 0), Some(0));
        assert_eq!(touched.get(0, 1), Some(-1));
    }

    #[test]
    fn test_holes_are_not_burned() {
        let outer = rect(0.0, 0.0, 3.0, 3.0);
        let hole = rect(1.0, 1.0, 2.0, 2.0);
        let with_hole = Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);
        let raster = rasterize(&[with_hole.into()], 3, 3, &unit_grid(3, 3), -1, false).unwrap();
        assert_eq!(raster.labelled_pixels(), 8);
        assert_eq!(raster.get(1, 1), Some(-1));
    }

    #[test]
    fn test_later_polygon_wins_overlap() {
        let polygons = vec![rect(0.0, 0.0, 2.0, 1.0).into(), rect(1.0, 0.0, 2.0, 1.0).into()];
        let raster = rasterize(&polygons, 2, 1, &unit_grid(2, 1), -1, false).unwrap();
        assert_eq!(raster.data().row(0).to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_geometry_outside_grid_is_ignored() {
        let polygons = vec![rect(100.0, 100.0, 101.0, 101.0).into()];
        let raster = rasterize(&polygons, 3, 3, &unit_grid(3, 3), -1, true).unwrap();
        assert_eq!(raster.labelled_pixels(), 0);
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        let polygons = vec![rect(0.0, 0.0, 1.0, 1.0).into()];
        assert!(rasterize(&polygons, 0, 3, &unit_grid(3, 3), -1, false).is_err());
        let singular = AffineTransform::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(rasterize(&polygons, 3, 3, &singular, -1, false).is_err());
        assert!(rasterize(&polygons, 3, 3, &unit_grid(3, 3), 0, false).is_err());
    }

    #[test]
    fn test_layer_crs_must_match_grid() {
        let layer = AdminLayer::new(
            "TST",
            1,
            CrsCode::Epsg3857,
            vec![raster_common::AdminPolygon::new("T1", rect(0.0, 0.0, 1.0, 1.0))],
        )
        .unwrap();
        let grid = GridGeometry::new(2, 2, unit_grid(2, 2), CrsCode::Epsg4326);
        let err = Rasterizer::default().rasterize_layer(&layer, &grid).unwrap_err();
        assert!(matches!(err, ZonalError::CrsMismatch { .. }));
    }
}
