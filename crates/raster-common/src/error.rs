//! Error types for raster and boundary inputs.

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors raised while constructing or reading grids and admin layers.
#[derive(Debug, Error)]
pub enum RasterError {
    /// A required axis is absent or has no coordinates.
    #[error("grid is missing required axis: {0}")]
    MissingAxis(String),

    /// Axis coordinates disagree with the data shape.
    #[error("axis '{axis}' has {actual} coordinates but data has {expected}")]
    AxisLength {
        axis: String,
        expected: usize,
        actual: usize,
    },

    /// The affine transform cannot map between pixel and world space.
    #[error("invalid affine transform: {0}")]
    InvalidTransform(String),

    #[error("invalid CRS: {0}")]
    InvalidCrs(String),

    /// An admin layer with no polygons.
    #[error("admin layer {iso3} adm{adm_level} has no polygons")]
    EmptyLayer { iso3: String, adm_level: u8 },

    /// Two polygons of one admin layer share a pcode.
    #[error("admin layer {iso3} adm{adm_level} repeats pcode '{pcode}'")]
    DuplicatePcode {
        iso3: String,
        adm_level: u8,
        pcode: String,
    },

    /// A grid document that cannot be turned into a grid.
    #[error("invalid grid document: {0}")]
    InvalidDocument(String),
}

impl RasterError {
    pub fn missing_axis(axis: impl Into<String>) -> Self {
        Self::MissingAxis(axis.into())
    }

    pub fn axis_length(axis: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::AxisLength {
            axis: axis.into(),
            expected,
            actual,
        }
    }

    pub fn invalid_transform(msg: impl Into<String>) -> Self {
        Self::InvalidTransform(msg.into())
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }
}

impl From<serde_json::Error> for RasterError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDocument(err.to_string())
    }
}
