//! Gridded datasets with named non-spatial axes.
//!
//! Every grid has the spatial axes `y` and `x`, a required `date` axis and
//! an optional `leadtime` axis (whole months between forecast issue and
//! valid date). Samples are stored as one 4-D array ordered
//! `(date, leadtime, y, x)`; grids without a leadtime axis carry a
//! length-1 leadtime dimension that is never exposed to callers.
//!
//! Every `(date, leadtime)` pair addresses one 2-D slice of identical
//! shape. NaN marks nodata.

use chrono::NaiveDate;
use ndarray::{s, Array3, Array4, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{AffineTransform, BoundingBox, CrsCode, RasterError, RasterResult};

/// Coordinates of the non-spatial axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxes {
    pub dates: Vec<NaiveDate>,
    /// Leadtimes in months, present only for forecast products.
    pub leadtimes: Option<Vec<u32>>,
}

impl GridAxes {
    pub fn has_leadtime(&self) -> bool {
        self.leadtimes.is_some()
    }

    fn leadtime_len(&self) -> usize {
        self.leadtimes.as_ref().map_or(1, Vec::len)
    }

    fn leadtime_at(&self, index: usize) -> Option<u32> {
        self.leadtimes.as_ref().map(|values| values[index])
    }
}

/// Spatial layout shared by every slice of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub width: usize,
    pub height: usize,
    pub transform: AffineTransform,
    pub crs: CrsCode,
}

impl GridGeometry {
    pub fn new(width: usize, height: usize, transform: AffineTransform, crs: CrsCode) -> Self {
        Self {
            width,
            height,
            transform,
            crs,
        }
    }

    /// Stable hash of shape, transform and CRS, used to key derived rasters.
    pub fn fingerprint(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        for coeff in self.transform.to_gdal() {
            coeff.to_bits().hash(&mut hasher);
        }
        self.crs.hash(&mut hasher);
        hasher.finish()
    }

    /// Same extent split into `factor` x `factor` sub-pixels.
    pub fn upsampled(&self, factor: usize) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
            transform: self.transform.upsampled(factor),
            crs: self.crs,
        }
    }
}

/// One spatial slice of a grid.
#[derive(Debug, Clone)]
pub struct RasterSlice<'a> {
    pub date: NaiveDate,
    pub leadtime: Option<u32>,
    pub values: ArrayView2<'a, f64>,
}

impl RasterSlice<'_> {
    /// True when no sample in the slice carries data.
    pub fn is_all_nan(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }
}

/// A time series of regular 2-D rasters sharing one transform and CRS.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    data: Array4<f64>,
    axes: GridAxes,
    transform: AffineTransform,
    crs: CrsCode,
}

impl RasterGrid {
    /// Grid with `date` and spatial axes; `data` is ordered `(date, y, x)`.
    pub fn observational(
        dates: Vec<NaiveDate>,
        data: Array3<f64>,
        transform: AffineTransform,
        crs: CrsCode,
    ) -> RasterResult<Self> {
        let data = data.insert_axis(Axis(1));
        Self::build(
            data,
            GridAxes {
                dates,
                leadtimes: None,
            },
            transform,
            crs,
        )
    }

    /// Grid with `date`, `leadtime` and spatial axes; `data` is ordered
    /// `(date, leadtime, y, x)`.
    pub fn forecast(
        dates: Vec<NaiveDate>,
        leadtimes: Vec<u32>,
        data: Array4<f64>,
        transform: AffineTransform,
        crs: CrsCode,
    ) -> RasterResult<Self> {
        if leadtimes.is_empty() {
            return Err(RasterError::missing_axis("leadtime"));
        }
        Self::build(
            data,
            GridAxes {
                dates,
                leadtimes: Some(leadtimes),
            },
            transform,
            crs,
        )
    }

    fn build(
        data: Array4<f64>,
        axes: GridAxes,
        transform: AffineTransform,
        crs: CrsCode,
    ) -> RasterResult<Self> {
        if axes.dates.is_empty() {
            return Err(RasterError::missing_axis("date"));
        }
        let (n_dates, n_leads, height, width) = data.dim();
        if n_dates != axes.dates.len() {
            return Err(RasterError::axis_length("date", n_dates, axes.dates.len()));
        }
        if n_leads != axes.leadtime_len() {
            return Err(RasterError::axis_length("leadtime", n_leads, axes.leadtime_len()));
        }
        if height == 0 {
            return Err(RasterError::missing_axis("y"));
        }
        if width == 0 {
            return Err(RasterError::missing_axis("x"));
        }
        transform.validate()?;

        Ok(Self {
            data,
            axes,
            transform,
            crs,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.axes.dates
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn is_forecast(&self) -> bool {
        self.axes.has_leadtime()
    }

    /// Number of 2-D slices (`dates x leadtimes`).
    pub fn slice_count(&self) -> usize {
        self.axes.dates.len() * self.axes.leadtime_len()
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.width(), self.height(), self.transform, self.crs)
    }

    /// World extent of the spatial grid.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width(), self.height())
    }

    /// Iterate every slice, dates outermost, leadtimes innermost.
    pub fn slices(&self) -> impl Iterator<Item = RasterSlice<'_>> + '_ {
        let n_leads = self.axes.leadtime_len();
        (0..self.axes.dates.len()).flat_map(move |d| {
            (0..n_leads).map(move |l| RasterSlice {
                date: self.axes.dates[d],
                leadtime: self.axes.leadtime_at(l),
                values: self.data.slice(s![d, l, .., ..]),
            })
        })
    }

    /// Restrict the date axis to `start..=end`.
    ///
    /// Returns `None` when no date falls in the range.
    pub fn select_dates(&self, start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let indices: Vec<usize> = self
            .axes
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d <= end)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return None;
        }

        Some(Self {
            data: self.data.select(Axis(0), &indices),
            axes: GridAxes {
                dates: indices.iter().map(|&i| self.axes.dates[i]).collect(),
                leadtimes: self.axes.leadtimes.clone(),
            },
            transform: self.transform,
            crs: self.crs,
        })
    }
}

/// On-disk JSON form of a [`RasterGrid`].
///
/// `values` is flattened in `(date, leadtime, y, x)` order with `null`
/// for nodata, since JSON has no NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDocument {
    pub crs: String,
    /// GDAL-ordered geotransform.
    pub geotransform: [f64; 6],
    pub width: usize,
    pub height: usize,
    pub dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leadtimes: Option<Vec<u32>>,
    pub values: Vec<Option<f64>>,
}

impl GridDocument {
    pub fn from_json(text: &str) -> RasterResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> RasterResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl TryFrom<GridDocument> for RasterGrid {
    type Error = RasterError;

    fn try_from(doc: GridDocument) -> RasterResult<Self> {
        let crs: CrsCode = doc.crs.parse()?;
        let transform = AffineTransform::from_gdal(doc.geotransform);
        let n_leads = doc.leadtimes.as_ref().map_or(1, Vec::len);
        let shape = (doc.dates.len(), n_leads, doc.height, doc.width);

        let values: Vec<f64> = doc
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        let data = Array4::from_shape_vec(shape, values).map_err(|e| {
            RasterError::invalid_document(format!("values do not match shape {:?}: {}", shape, e))
        })?;

        let axes = GridAxes {
            dates: doc.dates,
            leadtimes: doc.leadtimes,
        };
        if matches!(&axes.leadtimes, Some(l) if l.is_empty()) {
            return Err(RasterError::missing_axis("leadtime"));
        }
        RasterGrid::build(data, axes, transform, crs)
    }
}

impl From<&RasterGrid> for GridDocument {
    fn from(grid: &RasterGrid) -> Self {
        GridDocument {
            crs: grid.crs.to_string(),
            geotransform: grid.transform.to_gdal(),
            width: grid.width(),
            height: grid.height(),
            dates: grid.axes.dates.clone(),
            leadtimes: grid.axes.leadtimes.clone(),
            values: grid
                .data
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn transform() -> AffineTransform {
        AffineTransform::from_bounds(0.0, 0.0, 3.0, 2.0, 3, 2).unwrap()
    }

    #[test]
    fn test_observational_slices_follow_dates() {
        let data = Array::from_shape_fn((2, 2, 3), |(d, y, x)| (d * 100 + y * 10 + x) as f64);
        let grid = RasterGrid::observational(dates(2), data, transform(), CrsCode::Epsg4326).unwrap();

        assert!(!grid.is_forecast());
        assert_eq!(grid.slice_count(), 2);
        let slices: Vec<_> = grid.slices().collect();
        assert_eq!(slices[1].date, dates(2)[1]);
        assert_eq!(slices[1].leadtime, None);
        assert_eq!(slices[1].values[[1, 2]], 112.0);
    }

    #[test]
    fn test_forecast_slices_iterate_leadtimes_innermost() {
        let data = Array4::from_shape_fn((2, 3, 2, 3), |(d, l, _, _)| (d * 10 + l) as f64);
        let grid =
            RasterGrid::forecast(dates(2), vec![1, 2, 3], data, transform(), CrsCode::Epsg4326)
                .unwrap();

        let keys: Vec<_> = grid.slices().map(|s| (s.date, s.leadtime)).collect();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0], (dates(2)[0], Some(1)));
        assert_eq!(keys[4], (dates(2)[1], Some(2)));
    }

    #[test]
    fn test_axis_length_mismatch_rejected() {
        let data = Array3::<f64>::zeros((3, 2, 3));
        let err = RasterGrid::observational(dates(2), data, transform(), CrsCode::Epsg4326)
            .unwrap_err();
        assert!(matches!(err, RasterError::AxisLength { .. }));
    }

    #[test]
    fn test_missing_date_axis_rejected() {
        let data = Array3::<f64>::zeros((0, 2, 3));
        let err =
            RasterGrid::observational(Vec::new(), data, transform(), CrsCode::Epsg4326).unwrap_err();
        assert!(matches!(err, RasterError::MissingAxis(axis) if axis == "date"));
    }

    #[test]
    fn test_select_dates() {
        let data = Array::from_shape_fn((3, 2, 3), |(d, _, _)| d as f64);
        let grid = RasterGrid::observational(dates(3), data, transform(), CrsCode::Epsg4326).unwrap();

        let sub = grid.select_dates(dates(3)[1], dates(3)[2]).unwrap();
        assert_eq!(sub.dates(), &dates(3)[1..]);
        assert_eq!(sub.slices().next().unwrap().values[[0, 0]], 1.0);

        let before = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(grid.select_dates(before, before).is_none());
    }

    #[test]
    fn test_document_round_trip_keeps_nodata() {
        let mut data = Array::from_shape_fn((1, 2, 3), |(_, y, x)| (y * 3 + x) as f64);
        data[[0, 1, 1]] = f64::NAN;
        let grid = RasterGrid::observational(dates(1), data, transform(), CrsCode::Epsg4326).unwrap();

        let json = GridDocument::from(&grid).to_json().unwrap();
        assert!(json.contains("null"));

        let back = RasterGrid::try_from(GridDocument::from_json(&json).unwrap()).unwrap();
        let slice = back.slices().next().unwrap();
        assert!(slice.values[[1, 1]].is_nan());
        assert_eq!(slice.values[[1, 2]], 5.0);
        assert_eq!(back.transform(), grid.transform());
    }

    #[test]
    fn test_geometry_fingerprint_tracks_transform() {
        let data = Array3::<f64>::zeros((1, 2, 3));
        let grid = RasterGrid::observational(dates(1), data, transform(), CrsCode::Epsg4326).unwrap();
        let geometry = grid.geometry();
        assert_eq!(geometry.fingerprint(), geometry.fingerprint());

        let shifted = GridGeometry {
            transform: AffineTransform::from_bounds(1.0, 0.0, 4.0, 2.0, 3, 2).unwrap(),
            ..geometry
        };
        assert_ne!(geometry.fingerprint(), shifted.fingerprint());
        assert_eq!(geometry.upsampled(2).width, 6);
    }

    #[test]
    fn test_all_nan_slice_detection() {
        let data = Array3::from_elem((1, 2, 2), f64::NAN);
        let grid = RasterGrid::observational(
            dates(1),
            data,
            AffineTransform::from_bounds(0.0, 0.0, 2.0, 2.0, 2, 2).unwrap(),
            CrsCode::Epsg4326,
        )
        .unwrap();
        assert!(grid.slices().next().unwrap().is_all_nan());
    }
}
