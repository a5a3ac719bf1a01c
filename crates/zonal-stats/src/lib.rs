//! Zonal statistics of gridded datasets over administrative boundaries.
//!
//! A label raster is burned once per (country, admin level) and every
//! date/leadtime slice of the grid is reduced against it with a single
//! sort-based group-by, so the cost does not grow with polygon count.
//!
//! # Architecture
//!
//! ```text
//! RasterGrid + AdminLayer
//!      │
//!      ▼
//! Rasterizer::rasterize_layer ──► LabelCache (per iso3, adm_level, grid)
//!      │
//!      ▼
//! LabelRaster
//!      │
//!      ├─► for each (date, leadtime) slice
//!      │         │
//!      │         ├─► forecast slice all NaN: skip
//!      │         │
//!      │         └─► reduce(slice, labels) ──► ZoneStats per polygon
//!      │
//!      ▼
//! ZonalStatRecord ──► ResultValidator ──► StatsTable ──► StatsSink
//! ```
//!
//! # Example
//!
//! ```ignore
//! use zonal_stats::{BatchRunner, LabelCache, RunnerConfig};
//!
//! let runner = BatchRunner::new(RunnerConfig::from_env())?;
//! let mut cache = LabelCache::new(runner.config().label_cache_capacity);
//!
//! let table = runner.run_cached(&grid, &layer, &mut cache)?;
//! for record in table.iter() {
//!     println!("{} {} {:?}", record.pcode, record.valid_date, record.stats.mean);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coverage;
pub mod error;
pub mod rasterize;
pub mod record;
pub mod reducer;
pub mod runner;
pub mod sink;
pub mod stats;
pub mod validate;

// Re-export commonly used types at crate root
pub use cache::{CacheStats, LabelCache, LabelKey};
pub use config::{OnInvalid, RunnerConfig};
pub use coverage::{polygon_coverage, PolygonCoverage};
pub use error::{Result, ZonalError};
pub use rasterize::{rasterize, LabelRaster, Rasterizer};
pub use record::{ForecastInfo, RecordKey, StatsTable, ZonalStatRecord};
pub use reducer::reduce;
pub use runner::{issued_date, BatchRunner};
pub use sink::{QaRecord, StatsSink};
pub use stats::{Stat, StatSet, ZoneStats};
pub use validate::{ResultValidator, ValidationError, MAX_LEADTIME};
