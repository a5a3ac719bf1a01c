//! Raster and boundary sources for the pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use raster_common::{AdminLayer, GridDocument, RasterGrid};
use std::path::PathBuf;
use tracing::{debug, instrument};

use crate::geojson::FeatureCollection;

/// Supplies the dataset grid for a run.
///
/// Every slice must share one shape, transform and CRS.
#[async_trait]
pub trait GridSource: Send + Sync {
    async fn load_grid(&self) -> Result<RasterGrid>;
}

/// Supplies the polygon layer of one country at one admin level.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    async fn load_layer(&self, iso3: &str, adm_level: u8) -> Result<AdminLayer>;
}

/// Grid stored as a JSON grid document on the local filesystem.
pub struct LocalGridSource {
    path: PathBuf,
}

impl LocalGridSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GridSource for LocalGridSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_grid(&self) -> Result<RasterGrid> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read grid from {:?}", self.path))?;
        let doc = GridDocument::from_json(&text)
            .with_context(|| format!("Failed to parse grid document {:?}", self.path))?;
        let grid = RasterGrid::try_from(doc)?;

        debug!(
            width = grid.width(),
            height = grid.height(),
            slices = grid.slice_count(),
            forecast = grid.is_forecast(),
            "Loaded grid"
        );
        Ok(grid)
    }
}

/// Directory of `{iso3}_adm{level}.geojson` files, iso3 in lowercase.
pub struct GeoJsonBoundarySource {
    dir: PathBuf,
}

impl GeoJsonBoundarySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn layer_path(&self, iso3: &str, adm_level: u8) -> PathBuf {
        self.dir
            .join(format!("{}_adm{}.geojson", iso3.to_lowercase(), adm_level))
    }
}

#[async_trait]
impl BoundarySource for GeoJsonBoundarySource {
    async fn load_layer(&self, iso3: &str, adm_level: u8) -> Result<AdminLayer> {
        let path = self.layer_path(iso3, adm_level);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read boundaries from {:?}", path))?;
        FeatureCollection::from_json(&text)?
            .into_layer(iso3, adm_level)
            .with_context(|| format!("Invalid boundaries in {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{fixture_grid, temp_dir, write_file};

    #[tokio::test]
    async fn test_local_grid_round_trip() {
        let dir = temp_dir();
        let grid = fixture_grid();
        let json = GridDocument::from(&grid).to_json().unwrap();
        let path = write_file(dir.path(), "grid.json", &json);

        let loaded = LocalGridSource::new(path).load_grid().await.unwrap();
        assert_eq!(loaded.dates(), grid.dates());
        assert_eq!(loaded.width(), 4);
    }

    #[tokio::test]
    async fn test_missing_boundary_file() {
        let dir = temp_dir();
        let source = GeoJsonBoundarySource::new(dir.path());
        assert_eq!(source.layer_path("MOZ", 2), dir.path().join("moz_adm2.geojson"));
        assert!(source.load_layer("MOZ", 2).await.is_err());
    }
}
