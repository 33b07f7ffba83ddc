//! Median-based outlier rejection.
//!
//! Each sample is compared with the median of a small neighbourhood and
//! dropped when it strays further than the threshold. Near either end of the
//! series the neighbourhood is one-sided, so the first and last samples are
//! judged against the data that actually exists next to them.
//!
//! The filter is a single pass; it does not iterate to a fixed point.

use crate::logging::{PipelineLog, Stage};
use crate::model::WaterSample;

/// Default neighbourhood size.
pub const DEFAULT_WINDOW: usize = 7;

/// Default largest accepted distance from the neighbourhood median.
pub const DEFAULT_THRESHOLD: i32 = 300;

/// Median of `values`, averaging the two middle values for even counts.
/// Returns `None` for an empty slice.
pub(crate) fn median(values: &mut [i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] as f64 + values[mid] as f64) / 2.0)
    }
}

/// Levels of the neighbours of sample `i`, sentinel samples excluded.
fn neighbor_levels(samples: &[WaterSample], i: usize, window: usize) -> Vec<i32> {
    let n = samples.len();
    let half = window / 2;

    let range: Vec<&WaterSample> = if i < half {
        // Left border: right side only
        samples[i + 1..n.min(i + window)].iter().collect()
    } else if i >= n.saturating_sub(half) {
        // Right border: left side only
        samples[i.saturating_sub(window)..i].iter().collect()
    } else {
        samples[i - half..i]
            .iter()
            .chain(samples[i + 1..i + half + 1].iter())
            .collect()
    };

    range
        .into_iter()
        .filter(|s| !s.is_sentinel())
        .map(|s| s.level)
        .collect()
}

/// Drops every sample whose level is more than `threshold` away from the
/// median of its neighbourhood.
///
/// Samples without any usable neighbour are kept, as are sentinel samples
/// (their fate belongs to the gap filler). Chronological order is preserved.
pub fn detect_outliers(
    samples: Vec<WaterSample>,
    window: usize,
    threshold: i32,
    log: &dyn PipelineLog,
) -> Vec<WaterSample> {
    let keep: Vec<bool> = (0..samples.len())
        .map(|i| {
            let sample = &samples[i];
            if sample.is_sentinel() {
                return true;
            }
            let mut levels = neighbor_levels(&samples, i, window);
            match median(&mut levels) {
                None => {
                    log.debug(
                        Stage::Outliers,
                        format_args!("no neighbors for index {}, keeping level {}", i, sample.level),
                    );
                    true
                }
                Some(med) => {
                    let outlier = (sample.level as f64 - med).abs() > threshold as f64;
                    if outlier {
                        log.warn(
                            Stage::Outliers,
                            format_args!(
                                "outlier at index {} ({}): level {}, median {}",
                                i, sample.timestamp, sample.level, med
                            ),
                        );
                    }
                    !outlier
                }
            }
        })
        .collect();

    let before = samples.len();
    let cleaned: Vec<WaterSample> = samples
        .into_iter()
        .zip(keep)
        .filter_map(|(sample, keep)| keep.then_some(sample))
        .collect();

    log.info(
        Stage::Outliers,
        format_args!("kept {} of {} samples", cleaned.len(), before),
    );
    cleaned
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
