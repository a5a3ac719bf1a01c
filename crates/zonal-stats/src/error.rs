//! Error types for zonal statistics.

use raster_common::RasterError;
use thiserror::Error;

use crate::validate::ValidationError;

/// Errors that can occur while rasterizing, reducing or running batches.
#[derive(Error, Debug)]
pub enum ZonalError {
    /// Bad grid or boundary input for one (iso3, adm_level) unit.
    #[error("invalid input: {0}")]
    Input(#[from] RasterError),

    /// Raster and label arrays disagree in shape.
    #[error("shape mismatch: values are {values:?}, labels are {labels:?}")]
    ShapeMismatch {
        values: (usize, usize),
        labels: (usize, usize),
    },

    /// Polygon and raster coordinate systems differ.
    #[error("CRS mismatch: raster is {raster}, polygons are {polygons}")]
    CrsMismatch { raster: String, polygons: String },

    /// A label that cannot be mapped to a polygon.
    #[error("label {label} is outside the polygon collection of size {n_polygons}")]
    LabelOutOfRange { label: i64, n_polygons: usize },

    /// Rasterization failed for geometric reasons.
    #[error("rasterization failed: {0}")]
    Rasterize(String),

    /// A date that cannot be shifted by the requested number of months.
    #[error("date arithmetic overflow: {0}")]
    DateOutOfRange(String),

    /// A computed record broke a domain invariant.
    #[error("validation failed for {pcode} on {valid_date}: {source}")]
    Validation {
        pcode: String,
        valid_date: chrono::NaiveDate,
        #[source]
        source: ValidationError,
    },

    /// Invalid runner configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The persistence or QA collaborator failed.
    #[error("sink error: {0}")]
    Sink(String),
}

impl ZonalError {
    pub fn rasterize(msg: impl Into<String>) -> Self {
        Self::Rasterize(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}

/// Result type for zonal statistics operations.
pub type Result<T> = std::result::Result<T, ZonalError>;
