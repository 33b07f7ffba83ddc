//! Gap detection, sample validation and interpolation.
//!
//! Telemetry arrives every 10 minutes, but transmissions get lost and
//! sensors glitch. Walking the series pair by pair, the gap filler:
//!
//! 1. validates the next sample against the current one, falling back to the
//!    auxiliary channels when the primary one jumped too far,
//! 2. marks the sample as sentinel when no channel is plausible,
//! 3. inserts linearly interpolated samples for every missing 10-minute slot.
//!
//! The tolerated jump grows with the number of missing slots, since a river
//! can move further in 40 minutes than in 10.

use crate::logging::{PipelineLog, Stage};
use crate::model::{SAMPLE_CADENCE_MINUTES, WaterSample};
use chrono::Duration;

/// Checks `next` against `current.level`, channel by channel.
///
/// The first channel within `max_allowed` wins and is copied into `level`.
/// When none validates every channel becomes sentinel.
fn validate_next(current: &WaterSample, next: &mut WaterSample, max_allowed: i64, log: &dyn PipelineLog) {
    let within = |level: i32| (level as i64 - current.level as i64).abs() <= max_allowed;

    if within(next.level) {
        return;
    }
    if within(next.aux_level_a) {
        log.info(
            Stage::GapFill,
            format_args!(
                "{}: level {} rejected, using aux channel A ({})",
                next.timestamp, next.level, next.aux_level_a
            ),
        );
        next.level = next.aux_level_a;
    } else if within(next.aux_level_b) {
        log.info(
            Stage::GapFill,
            format_args!(
                "{}: level {} rejected, using aux channel B ({})",
                next.timestamp, next.level, next.aux_level_b
            ),
        );
        next.level = next.aux_level_b;
    } else {
        log.warn(
            Stage::GapFill,
            format_args!(
                "{}: no channel within {} of {} (levels {}/{}/{}), marking invalid",
                next.timestamp, max_allowed, current.level, next.level, next.aux_level_a, next.aux_level_b
            ),
        );
        next.invalidate();
    }
}

/// Synthetic samples for the `steps - 1` empty slots between two samples.
fn interpolate(current: &WaterSample, next: &WaterSample, steps: i64) -> Vec<WaterSample> {
    // An invalid endpoint contributes the current level instead.
    let end_level = if next.is_sentinel() { current.level } else { next.level };

    (1..steps)
        .map(|s| {
            let fraction = s as f64 / steps as f64;
            let level = (end_level as f64 * fraction + current.level as f64 * (1.0 - fraction)).round();
            let volume = next.volume * fraction + current.volume * (1.0 - fraction);
            WaterSample::synthetic(
                current.timestamp + Duration::minutes(SAMPLE_CADENCE_MINUTES * s),
                level as i32,
                volume,
            )
        })
        .collect()
}

/// Validates consecutive samples and fills missing 10-minute slots.
///
/// `max_delta` is the largest accepted level change per slot. Sentinel
/// samples are not emitted and are never interpolated around; the final
/// sample of the input is always emitted.
pub fn fill_gaps(mut samples: Vec<WaterSample>, max_delta: i32, log: &dyn PipelineLog) -> Vec<WaterSample> {
    if !samples.is_sorted_by_key(|s| s.timestamp) {
        log.warn(Stage::GapFill, format_args!("input not in time order, sorting"));
        samples.sort_by_key(|s| s.timestamp);
    }

    let mut filled = Vec::with_capacity(samples.len());
    let mut remaining = samples.into_iter();
    let Some(mut current) = remaining.next() else {
        return filled;
    };

    let mut inserted = 0usize;
    for mut next in remaining {
        if current.is_sentinel() {
            log.debug(
                Stage::GapFill,
                format_args!("skipping invalid sample at {}", current.timestamp),
            );
            current = next;
            continue;
        }

        // Elapsed minutes; equals the minute-of-hour difference for sub-hour gaps.
        let interval = (next.timestamp - current.timestamp).num_minutes();
        let steps = interval / SAMPLE_CADENCE_MINUTES;
        let max_allowed = max_delta as i64 * steps.max(1);

        validate_next(&current, &mut next, max_allowed, log);

        let synthetic = if steps > 1 {
            log.debug(
                Stage::GapFill,
                format_args!(
                    "gap of {} min after {}, inserting {} samples",
                    interval,
                    current.timestamp,
                    steps - 1
                ),
            );
            interpolate(&current, &next, steps)
        } else {
            Vec::new()
        };

        inserted += synthetic.len();
        filled.push(current);
        filled.extend(synthetic);
        current = next;
    }
    filled.push(current);

    log.info(
        Stage::GapFill,
        format_args!("{} samples after filling ({} interpolated)", filled.len(), inserted),
    );
    filled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
