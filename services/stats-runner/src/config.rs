//! Per-dataset pipeline configuration.
//!
//! One YAML file describes a dataset:
//!
//! ```yaml
//! dataset: era5
//! forecast: false
//! frequency: D
//! start_date: 2024-01-01
//! end_date: 2024-01-31
//! grid_path: data/era5.json
//! boundary_dir: data/boundaries
//! countries:
//!   - iso3: MOZ
//!     max_adm_level: 2
//! test:
//!   start_date: 2024-01-01
//!   end_date: 2024-01-03
//!   iso3s: [MOZ]
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use raster_common::{date_series, Frequency, MAX_ADM_LEVEL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zonal_stats::RunnerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset: String,
    pub forecast: bool,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// Defaults to yesterday.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub grid_path: PathBuf,
    pub boundary_dir: PathBuf,
    pub countries: Vec<CountryConfig>,
    #[serde(default)]
    pub test: Option<TestConfig>,
    /// Runner settings; taken from the environment when absent.
    #[serde(default)]
    pub runner: Option<RunnerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryConfig {
    pub iso3: String,
    pub max_adm_level: u8,
}

/// Smaller run used with `--test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub iso3s: Option<Vec<String>>,
}

/// Dates and countries of one run, resolved from a [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub countries: Vec<CountryConfig>,
}

/// Load and validate a pipeline configuration file.
///
/// Relative grid and boundary paths are resolved against the file's directory.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline config from {:?}", path))?;
    let mut config: PipelineConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse pipeline config from {:?}", path))?;

    if let Some(base) = path.parent() {
        if config.grid_path.is_relative() {
            config.grid_path = base.join(&config.grid_path);
        }
        if config.boundary_dir.is_relative() {
            config.boundary_dir = base.join(&config.boundary_dir);
        }
    }

    config.validate()?;
    Ok(config)
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dataset.is_empty() {
            bail!("dataset must not be empty");
        }
        if self.countries.is_empty() {
            bail!("at least one country must be configured");
        }
        for country in &self.countries {
            if country.max_adm_level > MAX_ADM_LEVEL {
                bail!(
                    "{}: max_adm_level {} exceeds {}",
                    country.iso3,
                    country.max_adm_level,
                    MAX_ADM_LEVEL
                );
            }
        }
        if let Some(runner) = &self.runner {
            runner
                .validate()
                .map_err(|e| anyhow::anyhow!("runner: {}", e))?;
        }
        Ok(())
    }

    /// Runner settings from the file, or from the environment.
    pub fn runner_config(&self) -> RunnerConfig {
        self.runner.clone().unwrap_or_else(RunnerConfig::from_env)
    }

    /// Resolve the dates and countries to process.
    pub fn plan(&self, test: bool, today: NaiveDate) -> Result<RunPlan> {
        let (start, end, iso3s) = match (&self.test, test) {
            (Some(t), true) => (t.start_date, t.end_date, t.iso3s.as_ref()),
            (None, true) => bail!("--test requested but {} has no test section", self.dataset),
            (_, false) => (self.start_date, self.end_date, None),
        };
        let end = end.unwrap_or(today - Duration::days(1));
        if end < start {
            bail!("end date {} precedes start date {}", end, start);
        }

        let countries = self
            .countries
            .iter()
            .filter(|c| iso3s.map_or(true, |sel| sel.iter().any(|s| s.eq_ignore_ascii_case(&c.iso3))))
            .cloned()
            .collect();

        Ok(RunPlan {
            start_date: start,
            end_date: end,
            dates: date_series(start, Some(end), self.frequency),
            countries,
        })
    }
}
