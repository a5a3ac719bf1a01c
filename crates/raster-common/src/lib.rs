//! Common types shared across the zonal statistics workspace.
//!
//! - [`RasterGrid`]: gridded samples over named `date` and optional
//!   `leadtime` axes, with an affine transform and CRS
//! - [`AdminLayer`]: one country's admin-level polygon collection
//! - calendar helpers for forecast issue/valid dates

pub mod admin;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod time;
pub mod transform;

pub use admin::{AdminLayer, AdminPolygon, MAX_ADM_LEVEL};
pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{RasterError, RasterResult};
pub use grid::{GridAxes, GridDocument, GridGeometry, RasterGrid, RasterSlice};
pub use time::{add_months, date_series, whole_months_between, Frequency};
pub use transform::AffineTransform;
