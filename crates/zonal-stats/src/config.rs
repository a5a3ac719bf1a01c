//! Configuration for batch runs.

use serde::{Deserialize, Serialize};

use crate::rasterize::Rasterizer;
use crate::stats::StatSet;

/// What a run does when a computed row fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnInvalid {
    /// Fail the whole (iso3, adm_level) unit.
    #[default]
    Abort,
    /// Drop the row, log it and keep going.
    Skip,
}

impl OnInvalid {
    /// Parse from string (case-insensitive), defaulting to `Abort`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "skip" => Self::Skip,
            _ => Self::Abort,
        }
    }
}

/// Configuration for the [`BatchRunner`](crate::BatchRunner).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Statistics to compute for every zone.
    pub stats: StatSet,

    /// Label every pixel touched by a polygon instead of only pixels whose
    /// centre falls inside it.
    pub all_touched: bool,

    /// Topology-preserving simplification tolerance in CRS units applied
    /// before rasterizing. 0 disables simplification.
    pub simplify_tolerance: f64,

    /// Label value for pixels outside every polygon. Must be negative.
    pub label_fill: i64,

    /// Number of label rasters kept by the label cache.
    pub label_cache_capacity: usize,

    /// Behaviour on rows that fail validation.
    pub on_invalid: OnInvalid,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stats: StatSet::standard(),
            all_touched: false,
            simplify_tolerance: 0.001,
            label_fill: -1,
            label_cache_capacity: 64,
            on_invalid: OnInvalid::Abort,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STATS_LIST") {
            if let Ok(stats) = val.parse() {
                config.stats = stats;
            }
        }

        if let Ok(val) = std::env::var("STATS_ALL_TOUCHED") {
            config.all_touched = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("STATS_SIMPLIFY_TOLERANCE") {
            if let Ok(tolerance) = val.parse() {
                config.simplify_tolerance = tolerance;
            }
        }

        if let Ok(val) = std::env::var("STATS_LABEL_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.label_cache_capacity = size;
            }
        }

        if let Ok(val) = std::env::var("STATS_ON_INVALID") {
            config.on_invalid = OnInvalid::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.stats.is_empty() {
            return Err("at least one statistic must be requested".to_string());
        }

        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err("simplify_tolerance must be a finite value >= 0".to_string());
        }

        if self.label_fill >= 0 {
            return Err("label_fill must be negative".to_string());
        }

        if self.label_cache_capacity == 0 {
            return Err("label_cache_capacity must be > 0".to_string());
        }

        Ok(())
    }

    /// Rasterizer using this configuration's settings.
    pub fn rasterizer(&self) -> Rasterizer {
        Rasterizer {
            simplify_tolerance: self.simplify_tolerance,
            all_touched: self.all_touched,
            fill: self.label_fill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simplify_tolerance, 0.001);
        assert_eq!(config.on_invalid, OnInvalid::Abort);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = RunnerConfig::default();
        config.label_fill = 0;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.simplify_tolerance = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::default();
        config.stats = StatSet::new([]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"stats": ["mean", "count"], "all_touched": true}"#).unwrap();
        assert!(config.all_touched);
        assert_eq!(config.stats.len(), 2);
        assert_eq!(config.label_cache_capacity, 64);
    }

    #[test]
    fn test_on_invalid_parse() {
        assert_eq!(OnInvalid::from_str("SKIP"), OnInvalid::Skip);
        assert_eq!(OnInvalid::from_str("anything"), OnInvalid::Abort);
    }
}
