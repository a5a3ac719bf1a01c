//! Dataset run orchestration.
//!
//! A run loads the dataset grid once, then walks every configured country
//! from admin level 0 up to its maximum level. Each (country, level) unit
//! is independent: a failure is written to the QA table and the run moves
//! on to the next unit.

use anyhow::{bail, Context, Result};
use raster_common::{AdminLayer, RasterGrid};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};
use zonal_stats::{
    polygon_coverage, BatchRunner, CacheStats, LabelCache, PolygonCoverage, QaRecord, StatsSink,
};

use crate::config::{CountryConfig, RunPlan};
use crate::sources::{BoundarySource, GridSource};

/// Outcome of one dataset run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub units_ok: usize,
    pub units_failed: usize,
    pub rows: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.units_failed == 0
    }
}

/// Polygon coverage of one (country, admin level).
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub iso3: String,
    pub adm_level: u8,
    pub polygons: Vec<PolygonCoverage>,
}

pub struct Pipeline {
    dataset: String,
    forecast: bool,
    runner: BatchRunner,
    grids: Arc<dyn GridSource>,
    boundaries: Arc<dyn BoundarySource>,
    sink: Arc<dyn StatsSink>,
    cache: LabelCache,
}

impl Pipeline {
    pub fn new(
        dataset: impl Into<String>,
        forecast: bool,
        runner: BatchRunner,
        grids: Arc<dyn GridSource>,
        boundaries: Arc<dyn BoundarySource>,
        sink: Arc<dyn StatsSink>,
    ) -> Self {
        let cache = LabelCache::new(runner.config().label_cache_capacity);
        Self {
            dataset: dataset.into(),
            forecast,
            runner,
            grids,
            boundaries,
            sink,
            cache,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Process every country and admin level of a plan.
    ///
    /// Only failures to load the grid or to write QA records abort the run.
    pub async fn run(&mut self, plan: &RunPlan) -> Result<RunSummary> {
        let grid = self.grids.load_grid().await.context("Failed to load dataset grid")?;
        if grid.is_forecast() != self.forecast {
            bail!(
                "{}: configured forecast={} but grid forecast={}",
                self.dataset,
                self.forecast,
                grid.is_forecast()
            );
        }
        let Some(grid) = grid.select_dates(plan.start_date, plan.end_date) else {
            bail!(
                "{}: grid has no dates between {} and {}",
                self.dataset,
                plan.start_date,
                plan.end_date
            );
        };

        info!(
            dataset = %self.dataset,
            dates = grid.dates().len(),
            slices = grid.slice_count(),
            countries = plan.countries.len(),
            "Starting run"
        );

        let mut summary = RunSummary::default();
        for country in &plan.countries {
            self.run_country(&grid, country, &mut summary).await?;
        }

        let cache = self.cache.stats();
        info!(
            dataset = %self.dataset,
            units_ok = summary.units_ok,
            units_failed = summary.units_failed,
            rows = summary.rows,
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            "Run complete"
        );
        Ok(summary)
    }

    /// Coverage of every planned (country, level) on the raw grid.
    ///
    /// Units that fail are logged and left out of the result.
    pub async fn coverage(&self, plan: &RunPlan, upscale_factor: usize) -> Result<Vec<CoverageReport>> {
        let geometry = self
            .grids
            .load_grid()
            .await
            .context("Failed to load dataset grid")?
            .geometry();
        let rasterizer = self.runner.config().rasterizer();

        let mut reports = Vec::new();
        for country in &plan.countries {
            for level in 0..=country.max_adm_level {
                let result = match self.boundaries.load_layer(&country.iso3, level).await {
                    Ok(layer) => polygon_coverage(&layer, &geometry, upscale_factor, &rasterizer)
                        .map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(polygons) => reports.push(CoverageReport {
                        iso3: country.iso3.clone(),
                        adm_level: level,
                        polygons,
                    }),
                    Err(e) => {
                        error!(iso3 = %country.iso3, adm_level = level, error = %e, "Coverage failed")
                    }
                }
            }
        }
        Ok(reports)
    }

    async fn run_country(
        &mut self,
        grid: &RasterGrid,
        country: &CountryConfig,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let adm0 = match self.prepare_country(grid, &country.iso3).await {
            Ok(layer) => layer,
            Err(e) => {
                error!(iso3 = %country.iso3, error = %e, "Country preparation failed");
                self.record_failure(&country.iso3, None, &e).await?;
                summary.units_failed += 1;
                return Ok(());
            }
        };

        let mut adm0 = Some(adm0);
        for level in 0..=country.max_adm_level {
            let span = info_span!("unit", iso3 = %country.iso3, adm_level = level);
            let result = match adm0.take().filter(|_| level == 0) {
                Some(layer) => self.run_unit(grid, &layer, span).await,
                None => match self.boundaries.load_layer(&country.iso3, level).await {
                    Ok(layer) => self.run_unit(grid, &layer, span).await,
                    Err(e) => Err(e),
                },
            };

            match result {
                Ok(rows) => {
                    summary.units_ok += 1;
                    summary.rows += rows;
                }
                Err(e) => {
                    error!(iso3 = %country.iso3, adm_level = level, error = %e, "Unit failed");
                    self.record_failure(&country.iso3, Some(level), &e).await?;
                    summary.units_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Load the country outline and check it overlaps the grid.
    async fn prepare_country(&self, grid: &RasterGrid, iso3: &str) -> Result<AdminLayer> {
        let adm0 = self.boundaries.load_layer(iso3, 0).await?;
        let grid_bounds = grid.bounds();
        match adm0.bounds() {
            Some(bounds) if bounds.intersects(&grid_bounds) => Ok(adm0),
            Some(bounds) => bail!(
                "{} boundaries {:?} do not overlap grid extent {:?}",
                iso3,
                bounds,
                grid_bounds
            ),
            None => bail!("{} boundaries have no extent", iso3),
        }
    }

    async fn run_unit(
        &mut self,
        grid: &RasterGrid,
        layer: &AdminLayer,
        span: tracing::Span,
    ) -> Result<usize> {
        let runner = self.runner.clone().with_span(span);
        let rows = runner
            .run_and_persist(&self.dataset, grid, layer, &mut self.cache, self.sink.as_ref())
            .await?;
        if rows == 0 {
            warn!(iso3 = %layer.iso3(), adm_level = layer.adm_level(), "No rows produced");
        }
        Ok(rows)
    }

    async fn record_failure(
        &self,
        iso3: &str,
        adm_level: Option<u8>,
        err: &anyhow::Error,
    ) -> Result<()> {
        let record = QaRecord::new(
            &self.dataset,
            iso3,
            adm_level,
            err.to_string(),
            format!("{:?}", err),
        );
        self.sink
            .record_qa(record)
            .await
            .context("Failed to write QA record")
    }
}
