//! Result Validator: domain invariants every row must satisfy before it
//! is persisted.
//!
//! NaN statistics mean "no coverage" and skip the checks that involve
//! them. Counts are unsigned, so `count >= 0` holds by construction.

use chrono::{NaiveDate, Utc};
use raster_common::{whole_months_between, MAX_ADM_LEVEL};
use thiserror::Error;

use crate::record::ZonalStatRecord;

/// Longest supported forecast leadtime, in months.
pub const MAX_LEADTIME: u32 = 6;

/// Relative slack for ordering checks between derived statistics.
const ORDER_TOLERANCE: f64 = 1e-9;

/// A violated record invariant with the offending values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("min ({min}) is greater than max ({max})")]
    MinAboveMax { min: f64, max: f64 },

    #[error("mean ({mean}) is outside [min, max] = [{min}, {max}]")]
    MeanOutOfRange { mean: f64, min: f64, max: f64 },

    #[error("median ({median}) is outside [min, max] = [{min}, {max}]")]
    MedianOutOfRange { median: f64, min: f64, max: f64 },

    #[error("std ({0}) is negative")]
    NegativeStd(f64),

    #[error("adm_level {0} is outside 0..={max}", max = MAX_ADM_LEVEL)]
    AdmLevelOutOfRange(u8),

    #[error("iso3 '{0}' is not three uppercase letters")]
    InvalidIso3(String),

    #[error("record iso3 '{actual}' does not match the unit being processed ('{expected}')")]
    Iso3Mismatch { expected: String, actual: String },

    #[error("issued_date {issued_date} is after valid_date {valid_date}")]
    IssuedAfterValid {
        issued_date: NaiveDate,
        valid_date: NaiveDate,
    },

    #[error("leadtime {0} is outside 0..={max}", max = MAX_LEADTIME)]
    LeadtimeOutOfRange(u32),

    #[error("leadtime {leadtime} does not match the {months} whole months between issued_date and valid_date")]
    LeadtimeMismatch { leadtime: u32, months: i32 },

    #[error("valid_date {valid_date} is after today ({today})")]
    FutureValidDate { valid_date: NaiveDate, today: NaiveDate },
}

/// Stateless per-record checks against a fixed "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultValidator {
    today: NaiveDate,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl ResultValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Check `record`, produced while processing the unit `iso3`.
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self, record: &ZonalStatRecord, iso3: &str) -> Result<(), ValidationError> {
        self.check_statistics(record)?;

        if record.adm_level > MAX_ADM_LEVEL {
            return Err(ValidationError::AdmLevelOutOfRange(record.adm_level));
        }
        if !is_iso3(iso3) {
            return Err(ValidationError::InvalidIso3(iso3.to_string()));
        }
        if record.iso3 != iso3 {
            return Err(ValidationError::Iso3Mismatch {
                expected: iso3.to_string(),
                actual: record.iso3.clone(),
            });
        }

        match record.forecast {
            Some(forecast) => {
                if forecast.issued_date > record.valid_date {
                    return Err(ValidationError::IssuedAfterValid {
                        issued_date: forecast.issued_date,
                        valid_date: record.valid_date,
                    });
                }
                if forecast.leadtime > MAX_LEADTIME {
                    return Err(ValidationError::LeadtimeOutOfRange(forecast.leadtime));
                }
                let months = whole_months_between(record.valid_date, forecast.issued_date);
                if months != forecast.leadtime as i32 {
                    return Err(ValidationError::LeadtimeMismatch {
                        leadtime: forecast.leadtime,
                        months,
                    });
                }
            }
            None => {
                if record.valid_date > self.today {
                    return Err(ValidationError::FutureValidDate {
                        valid_date: record.valid_date,
                        today: self.today,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_statistics(&self, record: &ZonalStatRecord) -> Result<(), ValidationError> {
        let stats = &record.stats;
        let defined = |v: Option<f64>| v.filter(|x| !x.is_nan());

        if let (Some(min), Some(max)) = (defined(stats.min), defined(stats.max)) {
            if min > max {
                return Err(ValidationError::MinAboveMax { min, max });
            }
            let slack = ORDER_TOLERANCE * min.abs().max(max.abs()).max(1.0);
            let within = |v: f64| v >= min - slack && v <= max + slack;

            if let Some(mean) = defined(stats.mean) {
                if !within(mean) {
                    return Err(ValidationError::MeanOutOfRange { mean, min, max });
                }
            }
            if let Some(median) = defined(stats.median) {
                if !within(median) {
                    return Err(ValidationError::MedianOutOfRange { median, min, max });
                }
            }
        }

        if let Some(std) = defined(stats.std) {
            if std < 0.0 {
                return Err(ValidationError::NegativeStd(std));
            }
        }
        Ok(())
    }
}

fn is_iso3(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ForecastInfo;
    use crate::stats::ZoneStats;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(min: f64, max: f64) -> ZonalStatRecord {
        ZonalStatRecord {
            iso3: "MOZ".to_string(),
            adm_level: 1,
            pcode: "MZ01".to_string(),
            valid_date: ymd(2024, 1, 1),
            forecast: None,
            stats: ZoneStats {
                mean: Some((min + max) / 2.0),
                median: Some((min + max) / 2.0),
                min: Some(min),
                max: Some(max),
                sum: Some(min + max),
                std: Some(0.5),
                count: Some(2),
                ..ZoneStats::default()
            },
        }
    }

    fn validator() -> ResultValidator {
        ResultValidator::new(ymd(2024, 6, 1))
    }

    #[test]
    fn test_valid_record_passes() {
        assert_eq!(validator().validate(&record(1.0, 3.0), "MOZ"), Ok(()));
    }

    #[test]
    fn test_min_above_max_fails() {
        let err = validator().validate(&record(5.0, 3.0), "MOZ").unwrap_err();
        assert_eq!(err, ValidationError::MinAboveMax { min: 5.0, max: 3.0 });
    }

    #[test]
    fn test_mean_and_median_bounds() {
        let mut r = record(1.0, 3.0);
        r.stats.mean = Some(4.0);
        assert!(matches!(
            validator().validate(&r, "MOZ"),
            Err(ValidationError::MeanOutOfRange { .. })
        ));

        let mut r = record(1.0, 3.0);
        r.stats.median = Some(0.0);
        assert!(matches!(
            validator().validate(&r, "MOZ"),
            Err(ValidationError::MedianOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rounding_noise_in_mean_is_accepted() {
        let mut r = record(0.1, 0.1);
        r.stats.mean = Some((0.1 + 0.1 + 0.1) / 3.0);
        assert_eq!(validator().validate(&r, "MOZ"), Ok(()));
    }

    #[test]
    fn test_nan_statistics_skip_checks() {
        let mut r = record(f64::NAN, f64::NAN);
        r.stats.mean = Some(f64::NAN);
        r.stats.std = Some(f64::NAN);
        r.stats.count = Some(0);
        assert_eq!(validator().validate(&r, "MOZ"), Ok(()));
    }

    #[test]
    fn test_negative_std_fails() {
        let mut r = record(1.0, 3.0);
        r.stats.std = Some(-0.1);
        assert_eq!(validator().validate(&r, "MOZ"), Err(ValidationError::NegativeStd(-0.1)));
    }

    #[test]
    fn test_admin_level_and_iso3() {
        let mut r = record(1.0, 3.0);
        r.adm_level = 5;
        assert_eq!(validator().validate(&r, "MOZ"), Err(ValidationError::AdmLevelOutOfRange(5)));

        let r = record(1.0, 3.0);
        assert!(matches!(validator().validate(&r, "moz"), Err(ValidationError::InvalidIso3(_))));
        assert!(matches!(validator().validate(&r, "MOZA"), Err(ValidationError::InvalidIso3(_))));
        assert!(matches!(
            validator().validate(&r, "MWI"),
            Err(ValidationError::Iso3Mismatch { .. })
        ));
    }

    #[test]
    fn test_future_observation_fails() {
        let mut r = record(1.0, 3.0);
        r.valid_date = ymd(2024, 6, 2);
        assert!(matches!(
            validator().validate(&r, "MOZ"),
            Err(ValidationError::FutureValidDate { .. })
        ));
    }

    #[test]
    fn test_forecast_rules() {
        let mut r = record(1.0, 3.0);
        r.valid_date = ymd(2025, 3, 1);
        r.forecast = Some(ForecastInfo { issued_date: ymd(2025, 1, 1), leadtime: 2 });
        // Future valid dates are expected for forecasts.
        assert_eq!(validator().validate(&r, "MOZ"), Ok(()));

        r.forecast = Some(ForecastInfo { issued_date: ymd(2024, 7, 1), leadtime: 8 });
        assert_eq!(validator().validate(&r, "MOZ"), Err(ValidationError::LeadtimeOutOfRange(8)));

        r.forecast = Some(ForecastInfo { issued_date: ymd(2025, 1, 1), leadtime: 3 });
        assert_eq!(
            validator().validate(&r, "MOZ"),
            Err(ValidationError::LeadtimeMismatch { leadtime: 3, months: 2 })
        );

        r.forecast = Some(ForecastInfo { issued_date: ymd(2025, 4, 1), leadtime: 0 });
        assert!(matches!(
            validator().validate(&r, "MOZ"),
            Err(ValidationError::IssuedAfterValid { .. })
        ));
    }
}
