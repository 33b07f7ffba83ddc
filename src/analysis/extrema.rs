//! Peak and trough detection.
//!
//! Detection runs in three steps:
//!
//! 1. **Relative extrema**: windowed prominence on the (optionally smoothed)
//!    level sequence. A candidate must be the maximum of its window and stand
//!    at least `delta` above the lowest sample on *each* side.
//! 2. **Absolute resolution**: each relative extremum is moved to the true
//!    highest (or lowest) raw sample within ±90 minutes, which corrects for
//!    smoothing and sampling noise. Duplicates of the same kind are dropped.
//! 3. **Trailing augmentation**: the prominence window cannot see the last
//!    `window / 2` samples, so when nothing was found in the last 3 hours
//!    the trailing window is inspected directly.

use crate::analysis::smoothing::Smoother;
use crate::config::ExtremaConfig;
use crate::logging::{PipelineLog, Stage};
use crate::model::{ExtremumEvent, ExtremumKind, WaterSample};
use chrono::Duration;

// ---------------------------------------------------------------------------
// Relative extrema
// ---------------------------------------------------------------------------

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Indices of windowed-prominence peaks in `values`.
///
/// Index `i` qualifies when `h = window / 2 <= i < n - h`, `values[i]` is the
/// maximum of `values[i-h..=i+h]`, and it exceeds the minimum of both the
/// left half and the right half by at least `delta`.
pub fn find_relative_extrema(values: &[f64], window: usize, delta: f64) -> Vec<usize> {
    let h = window / 2;
    if h == 0 || values.len() < 2 * h + 1 {
        return Vec::new();
    }

    (h..values.len() - h)
        .filter(|&i| {
            let v = values[i];
            let window_max = values[i - h..=i + h].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            v == window_max
                && v - min_of(&values[i - h..i]) >= delta
                && v - min_of(&values[i + 1..=i + h]) >= delta
        })
        .collect()
}

/// Troughs: peaks of the negated sequence.
pub fn find_relative_troughs(values: &[f64], window: usize, delta: f64) -> Vec<usize> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    find_relative_extrema(&negated, window, delta)
}

// ---------------------------------------------------------------------------
// Absolute resolution
// ---------------------------------------------------------------------------

/// Moves each relative extremum to the extreme raw sample within
/// `half_window` of it. The earliest sample wins ties; an index already
/// resolved for this kind is not recorded twice.
pub fn resolve_absolute(
    samples: &[WaterSample],
    relative: &[usize],
    kind: ExtremumKind,
    half_window: Duration,
) -> Vec<usize> {
    let mut resolved: Vec<usize> = Vec::new();

    for &idx in relative {
        let Some(center) = samples.get(idx) else {
            continue;
        };
        let from = center.timestamp - half_window;
        let to = center.timestamp + half_window;

        let mut best: Option<usize> = None;
        for (j, s) in samples.iter().enumerate() {
            if s.timestamp < from || s.timestamp > to || s.is_sentinel() {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => match kind {
                    ExtremumKind::Peak => s.level > samples[b].level,
                    ExtremumKind::Trough => s.level < samples[b].level,
                },
            };
            if better {
                best = Some(j);
            }
        }

        if let Some(b) = best {
            if !resolved.contains(&b) {
                resolved.push(b);
            }
        }
    }
    resolved
}

// ---------------------------------------------------------------------------
// Trailing augmentation
// ---------------------------------------------------------------------------

/// Looks for an extremum in the trailing window that the prominence search
/// could not reach yet.
///
/// Nothing is added when an event already lies within `lookback` of the last
/// sample. Otherwise the highest and lowest samples of the trailing window,
/// minus `margin` at both ends, become a peak and a trough respectively when
/// they differ from the last level by more than `delta` and lie strictly
/// inside the inner window. A flat window yields the peak only.
pub fn check_last_point(
    samples: &[WaterSample],
    events: &[ExtremumEvent],
    delta: i32,
    lookback: Duration,
    margin: Duration,
) -> Vec<ExtremumEvent> {
    let Some(last) = samples.last() else {
        return Vec::new();
    };

    let latest_event = events
        .iter()
        .filter_map(|e| samples.get(e.sample_index))
        .map(|s| s.timestamp)
        .max();
    if let Some(ts) = latest_event {
        if last.timestamp - ts <= lookback {
            return Vec::new();
        }
    }

    let inner_start = last.timestamp - lookback + margin;
    let inner_end = last.timestamp - margin;

    let mut highest: Option<usize> = None;
    let mut lowest: Option<usize> = None;
    for (i, s) in samples.iter().enumerate() {
        if s.timestamp < inner_start || s.timestamp > inner_end || s.is_sentinel() {
            continue;
        }
        if highest.is_none_or(|h| s.level > samples[h].level) {
            highest = Some(i);
        }
        if lowest.is_none_or(|l| s.level < samples[l].level) {
            lowest = Some(i);
        }
    }

    let qualifies = |i: usize| {
        let s = &samples[i];
        (s.level - last.level).abs() > delta && s.timestamp > inner_start && s.timestamp < inner_end
    };

    let mut added = Vec::new();
    if let Some(i) = highest.filter(|&i| qualifies(i)) {
        added.push(ExtremumEvent::peak(i));
    }
    // A flat window has one sample as both extremes; it is reported once
    if let Some(i) = lowest.filter(|&i| Some(i) != highest && qualifies(i)) {
        added.push(ExtremumEvent::trough(i));
    }
    added
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Runs relative detection, absolute resolution and trailing augmentation
/// over a sentinel-free sample sequence. Events come back sorted by index.
pub fn detect_extrema(
    samples: &[WaterSample],
    config: &ExtremaConfig,
    smoother: &dyn Smoother,
    log: &dyn PipelineLog,
) -> Vec<ExtremumEvent> {
    let raw: Vec<f64> = samples.iter().map(|s| s.level as f64).collect();
    let values = smoother.smooth(&raw);
    let delta = config.delta as f64;
    let half_window = Duration::minutes(config.absolute_half_window_minutes);

    let relative_peaks = find_relative_extrema(&values, config.window, delta);
    let relative_troughs = find_relative_troughs(&values, config.window, delta);
    log.debug(
        Stage::Extrema,
        format_args!(
            "{} relative peaks, {} relative troughs ({} smoothing)",
            relative_peaks.len(),
            relative_troughs.len(),
            smoother.name()
        ),
    );

    let mut events: Vec<ExtremumEvent> = resolve_absolute(samples, &relative_peaks, ExtremumKind::Peak, half_window)
        .into_iter()
        .map(ExtremumEvent::peak)
        .chain(
            resolve_absolute(samples, &relative_troughs, ExtremumKind::Trough, half_window)
                .into_iter()
                .map(ExtremumEvent::trough),
        )
        .collect();

    let trailing = check_last_point(
        samples,
        &events,
        config.delta,
        Duration::minutes(config.trailing_lookback_minutes),
        Duration::minutes(config.trailing_margin_minutes),
    );
    for event in &trailing {
        let s = &samples[event.sample_index];
        log.info(
            Stage::Extrema,
            format_args!("trailing {} at {} (level {})", event.kind, s.timestamp, s.level),
        );
    }
    events.extend(trailing);
    events.sort_by_key(|e| e.sample_index);

    for event in &events {
        let s = &samples[event.sample_index];
        log.debug(
            Stage::Extrema,
            format_args!("absolute {} at {} (level {})", event.kind, s.timestamp, s.level),
        );
    }
    events
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::smoothing::NoSmoothing;
    use crate::logging::NullLog;
    use chrono::{NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(levels: &[i32]) -> Vec<WaterSample> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                WaterSample::new(Some(i as u64), start() + Duration::minutes(10 * i as i64), *level)
            })
            .collect()
    }

    fn as_f64(levels: &[i32]) -> Vec<f64> {
        levels.iter().map(|l| *l as f64).collect()
    }

    /// Flat 100 with a symmetric bump peaking at `center`.
    fn bump(len: usize, center: usize, height: i32) -> Vec<i32> {
        (0..len)
            .map(|i| {
                let d = (i as i64 - center as i64).unsigned_abs() as i32;
                100 + (height - 30 * d).max(0)
            })
            .collect()
    }

    // --- relative extrema -----------------------------------------------------------

    #[test]
    fn test_unimodal_bump_yields_single_peak() {
        let levels = bump(30, 12, 100);
        let peaks = find_relative_extrema(&as_f64(&levels), 7, 10.0);
        assert_eq!(peaks, vec![12]);
    }

    #[test]
    fn test_absolute_resolution_keeps_bump_maximum() {
        let levels = bump(30, 12, 100);
        let samples = series(&levels);
        let resolved = resolve_absolute(&samples, &[12], ExtremumKind::Peak, Duration::minutes(90));
        assert_eq!(resolved, vec![12]);
    }

    #[test]
    fn test_prominence_required_on_both_sides() {
        // Rises to a plateau edge: no drop on the right side
        let levels = [100, 100, 100, 100, 150, 200, 200, 200, 200, 200, 200];
        let peaks = find_relative_extrema(&as_f64(&levels), 5, 10.0);
        assert!(peaks.is_empty(), "a step is not a peak, got {:?}", peaks);
    }

    #[test]
    fn test_small_bump_below_delta_is_ignored() {
        let levels = bump(30, 12, 5);
        assert!(find_relative_extrema(&as_f64(&levels), 7, 10.0).is_empty());
    }

    #[test]
    fn test_trough_found_via_negation() {
        let levels: Vec<i32> = bump(30, 15, 100).iter().map(|l| 400 - l).collect();
        assert_eq!(find_relative_troughs(&as_f64(&levels), 7, 10.0), vec![15]);
        assert!(find_relative_extrema(&as_f64(&levels), 7, 10.0).is_empty());
    }

    #[test]
    fn test_candidates_near_the_edges_are_not_reachable() {
        let levels = bump(20, 18, 100);
        assert!(find_relative_extrema(&as_f64(&levels), 7, 10.0).is_empty());
    }

    #[test]
    fn test_short_series_has_no_extrema() {
        assert!(find_relative_extrema(&[1.0, 5.0, 1.0], 7, 1.0).is_empty());
        assert!(find_relative_extrema(&[], 7, 1.0).is_empty());
    }

    // --- absolute resolution --------------------------------------------------------

    #[test]
    fn test_resolution_moves_to_higher_sample_within_90_minutes() {
        let mut levels = vec![100; 30];
        levels[10] = 150;
        levels[18] = 170; // 80 minutes later
        levels[25] = 400; // 150 minutes later, out of reach
        let samples = series(&levels);
        let resolved = resolve_absolute(&samples, &[10], ExtremumKind::Peak, Duration::minutes(90));
        assert_eq!(resolved, vec![18]);
    }

    #[test]
    fn test_resolution_prefers_earliest_on_ties() {
        let mut levels = vec![500; 20];
        levels[8] = 300;
        levels[12] = 300;
        let samples = series(&levels);
        let resolved = resolve_absolute(&samples, &[12], ExtremumKind::Trough, Duration::minutes(90));
        assert_eq!(resolved, vec![8]);
    }

    #[test]
    fn test_resolution_discards_duplicates() {
        let mut levels = vec![100; 30];
        levels[14] = 300;
        let samples = series(&levels);
        let resolved = resolve_absolute(&samples, &[12, 14, 16], ExtremumKind::Peak, Duration::minutes(90));
        assert_eq!(resolved, vec![14]);
    }

    // --- trailing augmentation ------------------------------------------------------

    #[test]
    fn test_trailing_peak_is_added_when_no_recent_event() {
        // 25 samples, 0..=240 min; inner window is (90, 210)
        let levels = bump(25, 15, 120);
        let samples = series(&levels);
        let added = check_last_point(&samples, &[], 20, Duration::hours(3), Duration::minutes(30));
        assert_eq!(added, vec![ExtremumEvent::peak(15)]);
    }

    #[test]
    fn test_trailing_check_skipped_when_event_is_recent() {
        let levels = bump(25, 15, 120);
        let samples = series(&levels);
        let recent = [ExtremumEvent::trough(10)];
        let added = check_last_point(&samples, &recent, 20, Duration::hours(3), Duration::minutes(30));
        assert!(added.is_empty());
    }

    #[test]
    fn test_trailing_extremes_on_inner_boundary_are_rejected() {
        let levels: Vec<i32> = (0..25).map(|i| 1000 + 20 * i).collect();
        let samples = series(&levels);
        let added = check_last_point(&samples, &[], 20, Duration::hours(3), Duration::minutes(30));
        assert!(added.is_empty(), "monotonic extremes sit on the inner window edges");
    }

    #[test]
    fn test_trailing_trough_needs_delta_from_last_level() {
        let levels: Vec<i32> = bump(25, 15, 120).iter().map(|l| 400 - l).collect();
        let samples = series(&levels);
        let added = check_last_point(&samples, &[], 20, Duration::hours(3), Duration::minutes(30));
        assert_eq!(added, vec![ExtremumEvent::trough(15)]);

        let shallow = check_last_point(&samples, &[], 500, Duration::hours(3), Duration::minutes(30));
        assert!(shallow.is_empty());
    }

    #[test]
    fn test_flat_trailing_window_yields_one_event() {
        let mut levels = vec![1000; 25];
        levels[24] = 1100;
        let mut samples = series(&levels);
        // Without the 90-minute sample the first in-window sample is strictly inside
        samples.remove(9);
        let added = check_last_point(&samples, &[], 20, Duration::hours(3), Duration::minutes(30));
        assert_eq!(added, vec![ExtremumEvent::peak(9)]);
    }

    // --- detector -----------------------------------------------------------------------

    #[test]
    fn test_detect_extrema_finds_peak_and_trough_in_order() {
        let mut levels = bump(60, 15, 150);
        for (i, level) in levels.iter_mut().enumerate().skip(30) {
            let d = (i as i64 - 42).unsigned_abs() as i32;
            *level = 100 - (150 - 30 * d).max(0);
        }
        let samples = series(&levels);
        let config = ExtremaConfig { window: 9, delta: 20, ..ExtremaConfig::default() };
        let events = detect_extrema(&samples, &config, &NoSmoothing, &NullLog);
        assert_eq!(events, vec![ExtremumEvent::peak(15), ExtremumEvent::trough(42)]);
    }
}
