//! Statistic selection and per-zone results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A summary statistic the reducer can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Mean,
    Median,
    Max,
    Min,
    Sum,
    /// Population standard deviation.
    Std,
    /// Number of non-NaN samples.
    Count,
    #[serde(rename = "percentile_10")]
    P10,
    #[serde(rename = "percentile_20")]
    P20,
    #[serde(rename = "percentile_30")]
    P30,
    #[serde(rename = "percentile_40")]
    P40,
    #[serde(rename = "percentile_50")]
    P50,
    #[serde(rename = "percentile_60")]
    P60,
    #[serde(rename = "percentile_70")]
    P70,
    #[serde(rename = "percentile_80")]
    P80,
    #[serde(rename = "percentile_90")]
    P90,
    /// Number of distinct non-NaN samples.
    Unique,
}

impl Stat {
    pub const ALL: [Stat; 17] = [
        Stat::Mean,
        Stat::Median,
        Stat::Max,
        Stat::Min,
        Stat::Sum,
        Stat::Std,
        Stat::Count,
        Stat::P10,
        Stat::P20,
        Stat::P30,
        Stat::P40,
        Stat::P50,
        Stat::P60,
        Stat::P70,
        Stat::P80,
        Stat::P90,
        Stat::Unique,
    ];

    /// The deciles, lowest first.
    pub const PERCENTILES: [Stat; 9] = [
        Stat::P10,
        Stat::P20,
        Stat::P30,
        Stat::P40,
        Stat::P50,
        Stat::P60,
        Stat::P70,
        Stat::P80,
        Stat::P90,
    ];

    /// Rank in percent for percentile statistics.
    pub fn percentile(&self) -> Option<u8> {
        match self {
            Self::P10 => Some(10),
            Self::P20 => Some(20),
            Self::P30 => Some(30),
            Self::P40 => Some(40),
            Self::P50 => Some(50),
            Self::P60 => Some(60),
            Self::P70 => Some(70),
            Self::P80 => Some(80),
            Self::P90 => Some(90),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::Std => "std",
            Self::Count => "count",
            Self::P10 => "percentile_10",
            Self::P20 => "percentile_20",
            Self::P30 => "percentile_30",
            Self::P40 => "percentile_40",
            Self::P50 => "percentile_50",
            Self::P60 => "percentile_60",
            Self::P70 => "percentile_70",
            Self::P80 => "percentile_80",
            Self::P90 => "percentile_90",
            Self::Unique => "unique",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stat::ALL
            .iter()
            .copied()
            .find(|stat| stat.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown statistic '{}'", s))
    }
}

/// An ordered, duplicate-free selection of statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Stat>", into = "Vec<Stat>")]
pub struct StatSet(Vec<Stat>);

impl StatSet {
    pub fn new(stats: impl IntoIterator<Item = Stat>) -> Self {
        let mut stats: Vec<Stat> = stats.into_iter().collect();
        stats.sort();
        stats.dedup();
        Self(stats)
    }

    /// The statistics stored by the main pipeline: everything but `unique`.
    pub fn standard() -> Self {
        Self::new(Stat::ALL.into_iter().filter(|s| *s != Stat::Unique))
    }

    pub fn contains(&self, stat: Stat) -> bool {
        self.0.binary_search(&stat).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Stat> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for StatSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl From<Vec<Stat>> for StatSet {
    fn from(stats: Vec<Stat>) -> Self {
        Self::new(stats)
    }
}

impl From<StatSet> for Vec<Stat> {
    fn from(set: StatSet) -> Self {
        set.0
    }
}

impl FromStr for StatSet {
    type Err = String;

    /// Parse a comma-separated list such as `mean,max,count`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Stat::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

/// Statistics of one label zone.
///
/// A field is `None` when its statistic was not requested. Requested
/// floating-point statistics are NaN for zones without data, except `sum`
/// which is `0.0`.
///
/// Percentiles interpolate linearly between the closest ranks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub sum: Option<f64>,
    pub std: Option<f64>,
    pub count: Option<u64>,
    /// Deciles 10..=90, in [`Stat::PERCENTILES`] order.
    #[serde(default)]
    pub percentiles: [Option<f64>; 9],
    pub unique: Option<u64>,
}

impl ZoneStats {
    /// Reduce the finite samples of one zone.
    ///
    /// NaN entries are ignored, so a row of the dense NaN-padded working
    /// array can be passed as is.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a f64>, stats: &StatSet) -> Self {
        let mut values: Vec<f64> = samples.into_iter().copied().filter(|v| !v.is_nan()).collect();
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let sum: f64 = values.iter().sum();
        let mean = if n == 0 { f64::NAN } else { sum / n as f64 };

        let mut out = ZoneStats::default();
        for stat in stats.iter() {
            match stat {
                Stat::Mean => out.mean = Some(mean),
                Stat::Median => out.median = Some(median_sorted(&values)),
                Stat::Max => out.max = Some(values.last().copied().unwrap_or(f64::NAN)),
                Stat::Min => out.min = Some(values.first().copied().unwrap_or(f64::NAN)),
                Stat::Sum => out.sum = Some(sum),
                Stat::Std => out.std = Some(population_std(&values, mean)),
                Stat::Count => out.count = Some(n as u64),
                Stat::P10
                | Stat::P20
                | Stat::P30
                | Stat::P40
                | Stat::P50
                | Stat::P60
                | Stat::P70
                | Stat::P80
                | Stat::P90 => {
                    if let Some(slot) = percentile_slot(stat) {
                        out.percentiles[slot] = Some(percentile_sorted(&values, slot_rank(slot)));
                    }
                }
                Stat::Unique => {
                    let mut distinct = values.clone();
                    distinct.dedup();
                    out.unique = Some(distinct.len() as u64);
                }
            }
        }
        out
    }

    /// Value of a floating-point statistic, if requested.
    pub fn get(&self, stat: Stat) -> Option<f64> {
        match stat {
            Stat::Mean => self.mean,
            Stat::Median => self.median,
            Stat::Max => self.max,
            Stat::Min => self.min,
            Stat::Sum => self.sum,
            Stat::Std => self.std,
            Stat::Count => self.count.map(|c| c as f64),
            Stat::Unique => self.unique.map(|c| c as f64),
            percentile => percentile_slot(percentile).and_then(|slot| self.percentiles[slot]),
        }
    }
}

fn percentile_slot(stat: Stat) -> Option<usize> {
    Stat::PERCENTILES.iter().position(|p| *p == stat)
}

fn slot_rank(slot: usize) -> f64 {
    ((slot + 1) * 10) as f64
}

/// Linear interpolation between closest ranks, as `numpy.percentile`.
fn percentile_sorted(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let rank = q / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}

fn median_sorted(values: &[f64]) -> f64 {
    let n = values.len();
    match n {
        0 => f64::NAN,
        _ if n % 2 == 1 => values[n / 2],
        _ => (values[n / 2 - 1] + values[n / 2]) / 2.0,
    }
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_parse_is_case_insensitive() {
        assert_eq!("Mean".parse::<Stat>().unwrap(), Stat::Mean);
        assert_eq!(" std ".parse::<Stat>().unwrap(), Stat::Std);
        assert!("p90".parse::<Stat>().is_err());
        assert_eq!("PERCENTILE_30".parse::<Stat>().unwrap(), Stat::P30);
        assert_eq!(Stat::P70.percentile(), Some(70));
        assert_eq!(Stat::Median.percentile(), None);
    }

    #[test]
    fn test_percentiles_interpolate_even_count() {
        let zs = ZoneStats::from_samples([4.0, 1.0, 3.0, 2.0].iter(), &StatSet::standard());
        assert!((zs.get(Stat::P10).unwrap() - 1.3).abs() < 1e-12);
        assert!((zs.get(Stat::P50).unwrap() - 2.5).abs() < 1e-12);
        assert!((zs.get(Stat::P90).unwrap() - 3.7).abs() < 1e-12);
        assert_eq!(zs.get(Stat::P50), zs.median);
    }

    #[test]
    fn test_percentiles_odd_and_single_sample() {
        let zs = ZoneStats::from_samples([10.0, 30.0, 20.0].iter(), &StatSet::new([Stat::P20]));
        assert!((zs.get(Stat::P20).unwrap() - 14.0).abs() < 1e-12);
        assert_eq!(zs.get(Stat::P80), None);

        let one = ZoneStats::from_samples([5.0].iter(), &StatSet::new(Stat::PERCENTILES));
        assert!(one.percentiles.iter().all(|p| *p == Some(5.0)));
    }

    #[test]
    fn test_percentiles_empty_zone_are_nan() {
        let zs = ZoneStats::from_samples([f64::NAN].iter(), &StatSet::new(Stat::PERCENTILES));
        assert!(zs.percentiles.iter().all(|p| p.is_some_and(f64::is_nan)));
    }

    #[test]
    fn test_stat_set_dedups_and_sorts() {
        let set: StatSet = "count,mean,mean".parse().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Stat::Mean, Stat::Count]);
        assert!(!set.contains(Stat::Unique));
    }

    #[test]
    fn test_zone_stats_ignore_nan_padding() {
        let row = [4.0, 1.0, f64::NAN, 2.0, f64::NAN];
        let zs = ZoneStats::from_samples(row.iter(), &StatSet::standard());
        assert_eq!(zs.count, Some(3));
        assert_eq!(zs.sum, Some(7.0));
        assert_eq!(zs.median, Some(2.0));
        assert_eq!(zs.max, Some(4.0));
        assert_eq!(zs.min, Some(1.0));
        assert!((zs.mean.unwrap() - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(zs.unique, None);
    }

    #[test]
    fn test_empty_zone() {
        let zs = ZoneStats::from_samples([f64::NAN, f64::NAN].iter(), &StatSet::new(Stat::ALL));
        assert_eq!(zs.count, Some(0));
        assert_eq!(zs.unique, Some(0));
        assert_eq!(zs.sum, Some(0.0));
        assert!(zs.mean.unwrap().is_nan());
        assert!(zs.std.unwrap().is_nan());
        assert!(zs.max.unwrap().is_nan());
    }

    #[test]
    fn test_even_median_and_population_std() {
        let zs = ZoneStats::from_samples([2.0, 4.0, 4.0, 6.0].iter(), &StatSet::new(Stat::ALL));
        assert_eq!(zs.median, Some(4.0));
        assert_eq!(zs.unique, Some(3));
        assert!((zs.std.unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stat_set_serde_as_list() {
        let set = StatSet::new([Stat::Max, Stat::Mean]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["mean","max"]"#);

        let parsed: StatSet = serde_json::from_str(r#"["percentile_90", "count"]"#).unwrap();
        assert_eq!(parsed.iter().collect::<Vec<_>>(), vec![Stat::Count, Stat::P90]);
    }
}
