//! Zonal Reducer: per-label statistics of one raster slice.
//!
//! # Algorithm
//!
//! 1. Pair every labelled pixel with its value and sort the pairs by
//!    label, giving the distinct labels and their pixel counts in one pass.
//! 2. Reserve `max(expected, max_label + 1)` output rows so labels that
//!    never reach the raster still get a row.
//! 3. Scatter each label's values, left-packed, into a dense
//!    `n_labels x max_count` working array padded with NaN.
//! 4. Reduce every row with NaN-aware statistics.
//!
//! The cost is dominated by the sort, independent of polygon count.
//! Empty rows are not an error: they yield NaN statistics, a zero count
//! and a zero sum.

use ndarray::{Array2, ArrayView2};
use tracing::trace;

use crate::error::{Result, ZonalError};
use crate::rasterize::LabelRaster;
use crate::stats::{StatSet, ZoneStats};

/// Compute `stats` for each label `0..n` over `values`.
///
/// `expected_labels` is the size of the polygon collection the labels
/// index into. The output has exactly `max(expected_labels,
/// max_label + 1)` entries in label order.
pub fn reduce(
    values: ArrayView2<'_, f64>,
    labels: &LabelRaster,
    expected_labels: Option<usize>,
    stats: &StatSet,
) -> Result<Vec<ZoneStats>> {
    if values.dim() != labels.shape() {
        return Err(ZonalError::ShapeMismatch {
            values: values.dim(),
            labels: labels.shape(),
        });
    }

    let fill = labels.fill();
    let mut pairs: Vec<(usize, f64)> = Vec::with_capacity(labels.labelled_pixels());
    for (&label, &value) in labels.data().iter().zip(values.iter()) {
        if label == fill {
            continue;
        }
        if label < 0 {
            return Err(ZonalError::LabelOutOfRange {
                label,
                n_polygons: expected_labels.unwrap_or(0),
            });
        }
        pairs.push((label as usize, value));
    }
    pairs.sort_by_key(|&(label, _)| label);

    let groups = unique_with_counts(&pairs);
    let observed = groups.last().map_or(0, |&(label, _)| label + 1);
    let n_labels = expected_labels.unwrap_or(0).max(observed);
    let max_count = groups.iter().map(|&(_, count)| count).max().unwrap_or(0);

    let mut dense = Array2::from_elem((n_labels, max_count), f64::NAN);
    let mut offset = 0;
    for &(label, count) in &groups {
        for (slot, &(_, value)) in pairs[offset..offset + count].iter().enumerate() {
            dense[[label, slot]] = value;
        }
        offset += count;
    }

    trace!(
        n_labels,
        present = groups.len(),
        max_count,
        "Built dense zonal working array"
    );

    Ok(dense
        .rows()
        .into_iter()
        .map(|row| ZoneStats::from_samples(row.iter(), stats))
        .collect())
}

/// Distinct labels of label-sorted pairs with their run lengths.
fn unique_with_counts(sorted: &[(usize, f64)]) -> Vec<(usize, usize)> {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &(label, _) in sorted {
        match groups.last_mut() {
            Some((last, count)) if *last == label => *count += 1,
            _ => groups.push((label, 1)),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stat;
    use ndarray::array;

    fn all_stats() -> StatSet {
        StatSet::new(Stat::ALL)
    }

    #[test]
    fn test_basic_zones() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let labels = LabelRaster::new(array![[1, 1, 2], [1, 2, 2], [0, 0, 0]], -1);

        let zones = reduce(values.view(), &labels, None, &all_stats()).unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].mean, Some(8.0));
        assert_eq!(zones[0].count, Some(3));
        assert_eq!(zones[1].max, Some(4.0));
        assert_eq!(zones[1].sum, Some(7.0));
        assert_eq!(zones[2].min, Some(3.0));
        assert!((zones[2].std.unwrap() - 1.247219).abs() < 1e-6);
    }

    #[test]
    fn test_dropped_labels_keep_slots() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let labels = LabelRaster::new(array![[1, 1, 2], [5, 2, 2], [0, 0, 0]], -1);

        let zones = reduce(values.view(), &labels, None, &all_stats()).unwrap();
        assert_eq!(zones.len(), 6);
        assert_eq!(zones[5].median, Some(4.0));
        assert_eq!(zones[4].count, Some(0));
        assert!(zones[3].mean.unwrap().is_nan());
        assert_eq!(zones[3].sum, Some(0.0));
    }

    #[test]
    fn test_expected_count_reserves_trailing_rows() {
        let values = array![[1.0, 2.0]];
        let labels = LabelRaster::new(array![[0, 0]], -1);

        let zones = reduce(values.view(), &labels, Some(3), &StatSet::standard()).unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0].mean, Some(1.5));
        assert_eq!(zones[2].count, Some(0));
    }

    #[test]
    fn test_fill_and_nan_cells_are_ignored() {
        let values = array![[f64::NAN, 2.0, 100.0], [3.0, 4.0, 100.0]];
        let labels = LabelRaster::new(array![[0, 0, -9999], [0, 0, -9999]], -9999);

        let zones = reduce(values.view(), &labels, Some(1), &all_stats()).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].count, Some(3));
        assert_eq!(zones[0].mean, Some(3.0));
        assert_eq!(zones[0].unique, Some(3));
    }

    #[test]
    fn test_all_fill_raster_yields_expected_empty_rows() {
        let values = array![[1.0, 2.0]];
        let labels = LabelRaster::filled(1, 2, -1);

        let zones = reduce(values.view(), &labels, Some(2), &StatSet::standard()).unwrap();
        assert_eq!(zones.len(), 2);
        assert!(zones.iter().all(|z| z.count == Some(0) && z.sum == Some(0.0)));
        assert!(reduce(values.view(), &labels, None, &StatSet::standard()).unwrap().is_empty());
    }

    #[test]
    fn test_shape_mismatch() {
        let values = array![[1.0, 2.0]];
        let labels = LabelRaster::filled(2, 1, -1);
        let err = reduce(values.view(), &labels, None, &StatSet::standard()).unwrap_err();
        assert!(matches!(err, ZonalError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_negative_label_rejected() {
        let values = array![[1.0, 2.0]];
        let labels = LabelRaster::new(array![[-2, 0]], -1);
        let err = reduce(values.view(), &labels, None, &StatSet::standard()).unwrap_err();
        assert!(matches!(err, ZonalError::LabelOutOfRange { label: -2, .. }));
    }

    #[test]
    fn test_unrequested_stats_are_none() {
        let values = array![[1.0, 2.0]];
        let labels = LabelRaster::new(array![[0, 0]], -1);
        let zones = reduce(values.view(), &labels, None, &StatSet::new([Stat::Max])).unwrap();
        assert_eq!(zones[0].max, Some(2.0));
        assert_eq!(zones[0].mean, None);
        assert_eq!(zones[0].count, None);
    }
}
