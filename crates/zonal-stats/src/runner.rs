//! Batch Runner: reduce every slice of a grid over one admin layer.

use raster_common::{add_months, AdminLayer, RasterGrid};
use tracing::{debug, info, warn, Instrument, Span};

use crate::cache::{LabelCache, LabelKey};
use crate::config::{OnInvalid, RunnerConfig};
use crate::error::{Result, ZonalError};
use crate::rasterize::LabelRaster;
use crate::record::{ForecastInfo, StatsTable, ZonalStatRecord};
use crate::reducer::reduce;
use crate::sink::StatsSink;
use crate::validate::ResultValidator;

/// Computes zonal statistics tables for (grid, admin layer) pairs.
///
/// The label raster is built once per call (or taken from a
/// [`LabelCache`]) and reused for every date and leadtime. Events are
/// emitted inside the runner's span, which is disabled unless one is
/// supplied with [`BatchRunner::with_span`].
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: RunnerConfig,
    validator: ResultValidator,
    span: Span,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        config.validate().map_err(ZonalError::config)?;
        Ok(Self {
            config,
            validator: ResultValidator::default(),
            span: Span::none(),
        })
    }

    /// Use a validator with a fixed "today".
    pub fn with_validator(mut self, validator: ResultValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Rasterize `layer` onto the spatial grid of `grid`.
    pub fn label_raster(&self, grid: &RasterGrid, layer: &AdminLayer) -> Result<LabelRaster> {
        self.config.rasterizer().rasterize_layer(layer, &grid.geometry())
    }

    /// Rasterize `layer` and reduce every slice of `grid`.
    pub fn run(&self, grid: &RasterGrid, layer: &AdminLayer) -> Result<StatsTable> {
        let labels = {
            let _enter = self.span.enter();
            self.label_raster(grid, layer)?
        };
        self.run_with_labels(grid, layer, &labels)
    }

    /// Like [`run`](Self::run), reusing a cached label raster when present.
    pub fn run_cached(
        &self,
        grid: &RasterGrid,
        layer: &AdminLayer,
        cache: &mut LabelCache,
    ) -> Result<StatsTable> {
        let geometry = grid.geometry();
        let rasterizer = self.config.rasterizer();
        let labels = {
            let _enter = self.span.enter();
            cache.get_or_try_insert(LabelKey::new(layer, &geometry, &rasterizer), || {
                rasterizer.rasterize_layer(layer, &geometry)
            })?
        };
        self.run_with_labels(grid, layer, &labels)
    }

    /// Reduce every slice of `grid` against precomputed `labels`.
    ///
    /// Forecast slices that hold no data at all are skipped, since that
    /// (date, leadtime) pair does not exist for the forecast issue.
    /// Observational slices are always reduced.
    pub fn run_with_labels(
        &self,
        grid: &RasterGrid,
        layer: &AdminLayer,
        labels: &LabelRaster,
    ) -> Result<StatsTable> {
        let _enter = self.span.enter();
        let iso3 = layer.iso3();
        let adm_level = layer.adm_level();

        let mut table = StatsTable::new();
        let mut skipped_slices = 0usize;
        let mut invalid_rows = 0usize;

        for slice in grid.slices() {
            if grid.is_forecast() && slice.is_all_nan() {
                skipped_slices += 1;
                continue;
            }

            let forecast = match slice.leadtime {
                Some(leadtime) => Some(ForecastInfo {
                    issued_date: issued_date(slice.date, leadtime)?,
                    leadtime,
                }),
                None => None,
            };

            let zones = reduce(
                slice.values,
                labels,
                Some(layer.len()),
                &self.config.stats,
            )?;

            for (index, stats) in zones.into_iter().enumerate() {
                let pcode = layer.pcode(index).ok_or(ZonalError::LabelOutOfRange {
                    label: index as i64,
                    n_polygons: layer.len(),
                })?;
                let record = ZonalStatRecord {
                    iso3: iso3.to_string(),
                    adm_level,
                    pcode: pcode.to_string(),
                    valid_date: slice.date,
                    forecast,
                    stats,
                };

                if let Err(source) = self.validator.validate(&record, iso3) {
                    match self.config.on_invalid {
                        OnInvalid::Abort => {
                            return Err(ZonalError::Validation {
                                pcode: record.pcode,
                                valid_date: record.valid_date,
                                source,
                            })
                        }
                        OnInvalid::Skip => {
                            warn!(
                                iso3 = %iso3,
                                adm_level,
                                pcode = %record.pcode,
                                valid_date = %record.valid_date,
                                error = %source,
                                "Dropping invalid row"
                            );
                            invalid_rows += 1;
                            continue;
                        }
                    }
                }
                table.push(record);
            }

            debug!(
                iso3 = %iso3,
                adm_level,
                date = %slice.date,
                leadtime = ?slice.leadtime,
                "Reduced slice"
            );
        }

        info!(
            iso3 = %iso3,
            adm_level,
            rows = table.len(),
            skipped_slices,
            invalid_rows,
            "Computed zonal statistics"
        );
        Ok(table)
    }

    /// Run and hand the table to `sink`, returning the number of rows written.
    pub async fn run_and_persist(
        &self,
        dataset: &str,
        grid: &RasterGrid,
        layer: &AdminLayer,
        cache: &mut LabelCache,
        sink: &dyn StatsSink,
    ) -> Result<usize> {
        let table = self.run_cached(grid, layer, cache)?;
        let written = sink
            .upsert(dataset, &table)
            .instrument(self.span.clone())
            .await?;

        self.span.in_scope(|| {
            info!(
                dataset = %dataset,
                iso3 = %layer.iso3(),
                adm_level = layer.adm_level(),
                rows = written,
                "Persisted zonal statistics"
            )
        });
        Ok(written)
    }
}

/// Issue date of a forecast valid on `valid_date` with `leadtime` months.
pub fn issued_date(valid_date: chrono::NaiveDate, leadtime: u32) -> Result<chrono::NaiveDate> {
    i32::try_from(leadtime)
        .ok()
        .and_then(|months| add_months(valid_date, -months))
        .ok_or_else(|| {
            ZonalError::DateOutOfRange(format!(
                "{} minus {} months",
                valid_date, leadtime
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_issued_date_subtracts_months() {
        let valid = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            issued_date(valid, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(issued_date(valid, 0).unwrap(), valid);
        assert!(issued_date(valid, u32::MAX).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RunnerConfig {
            label_cache_capacity: 0,
            ..RunnerConfig::default()
        };
        assert!(matches!(BatchRunner::new(config), Err(ZonalError::Config(_))));
    }
}
