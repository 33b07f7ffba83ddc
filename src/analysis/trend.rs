//! Trend assignment over the report anchors.
//!
//! Three anchors are taken relative to the invocation time: 4 hours ago,
//! 2 hours ago and now. The older two pick the *earliest* sample of their
//! trailing window (with a few minutes of slack for cadence jitter); the
//! "now" anchor picks the sample closest to now. Each anchor's trend
//! compares it with the anchor before it, and the oldest anchor compares
//! with a reference sample 6 hours back.

use crate::config::TrendConfig;
use crate::logging::{PipelineLog, Stage};
use crate::model::{ReportPoint, Trend, WaterSample};
use chrono::{Duration, NaiveDateTime};

/// Earliest valid sample with `from <= timestamp <= to`.
fn earliest_in(samples: &[WaterSample], from: NaiveDateTime, to: NaiveDateTime) -> Option<&WaterSample> {
    samples
        .iter()
        .filter(|s| !s.is_sentinel() && s.timestamp >= from && s.timestamp <= to)
        .min_by_key(|s| s.timestamp)
}

/// Valid sample closest to `target` within `[from, to]`; the later one on ties.
fn closest_to(
    samples: &[WaterSample],
    target: NaiveDateTime,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Option<&WaterSample> {
    let mut best: Option<&WaterSample> = None;
    for s in samples.iter().filter(|s| !s.is_sentinel() && s.timestamp >= from && s.timestamp <= to) {
        let distance = (s.timestamp - target).abs();
        if best.is_none_or(|b| distance <= (b.timestamp - target).abs()) {
            best = Some(s);
        }
    }
    best
}

/// Builds up to three report points in chronological order.
///
/// A missing anchor is omitted. When the anchor an anchor would compare with
/// is missing, the nearest earlier anchor is used, then the reference; with
/// nothing to compare against the trend is `Steady`.
pub fn assign_trends(
    samples: &[WaterSample],
    now: NaiveDateTime,
    config: &TrendConfig,
    log: &dyn PipelineLog,
) -> Vec<ReportPoint> {
    let slack = Duration::minutes(config.slack_minutes);
    let lookback = Duration::minutes(config.reference_lookback_minutes);

    let reference = earliest_in(samples, now - lookback - slack, now);
    match reference {
        Some(r) => log.debug(
            Stage::Trend,
            format_args!("reference sample at {} (level {})", r.timestamp, r.level),
        ),
        None => log.warn(Stage::Trend, format_args!("no reference sample in the last {} min", lookback.num_minutes())),
    }

    let mut compared_to = reference.map(|r| r.level);
    let mut points = Vec::with_capacity(config.anchor_offsets_minutes.len());
    let last = config.anchor_offsets_minutes.len() - 1;

    for (k, &offset) in config.anchor_offsets_minutes.iter().enumerate() {
        let offset = Duration::minutes(offset);
        let anchor = if k == last {
            closest_to(samples, now - offset, now - lookback - slack, now + slack)
        } else {
            earliest_in(samples, now - offset - slack, now)
        };

        let Some(anchor) = anchor else {
            log.warn(
                Stage::Trend,
                format_args!("no sample for the {} min anchor, omitting it", offset.num_minutes()),
            );
            continue;
        };

        let trend = compared_to
            .map(|level| Trend::between(anchor.level, level))
            .unwrap_or(Trend::Steady);
        log.info(
            Stage::Trend,
            format_args!(
                "anchor -{} min: {} level {} trend {:?}",
                offset.num_minutes(),
                anchor.timestamp,
                anchor.level,
                trend
            ),
        );
        points.push(ReportPoint::new(anchor.timestamp, anchor.level, trend));
        compared_to = Some(anchor.level);
    }

    points.sort_by_key(|p| p.timestamp());
    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
