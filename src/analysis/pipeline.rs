//! End-to-end conditioning and detection pipeline.
//!
//! raw samples → outliers → gap fill → (drop residual sentinels) →
//! extrema → duplicate runs → close events → trends
//!
//! `run` is a pure function of its inputs: "now" is passed in, every stage
//! returns a fresh sequence, and nothing is kept between calls.

use crate::analysis::consolidate::{remove_close_events, remove_duplicate_runs};
use crate::analysis::extrema::detect_extrema;
use crate::analysis::gaps::fill_gaps;
use crate::analysis::outliers::detect_outliers;
use crate::analysis::smoothing::smoother_for;
use crate::analysis::trend::assign_trends;
use crate::config::PipelineConfig;
use crate::logging::{PipelineLog, Stage};
use crate::model::{EventSample, ExtremumEvent, ReportPoint, WaterSample};
use chrono::NaiveDateTime;

/// Everything one run produces. `events` index into `samples`.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub samples: Vec<WaterSample>,
    pub events: Vec<ExtremumEvent>,
    pub points: Vec<ReportPoint>,
}

impl PipelineOutput {
    /// Events resolved against their samples, in chronological order.
    pub fn event_samples(&self) -> Vec<EventSample> {
        self.events
            .iter()
            .filter_map(|e| {
                self.samples.get(e.sample_index).map(|s| EventSample {
                    timestamp: s.timestamp,
                    level: s.level,
                    kind: e.kind,
                })
            })
            .collect()
    }
}

/// Runs every stage over `samples` as of `now`.
///
/// Never fails: empty or degenerate input yields an empty or partial output.
pub fn run(
    samples: Vec<WaterSample>,
    now: NaiveDateTime,
    config: &PipelineConfig,
    log: &dyn PipelineLog,
) -> PipelineOutput {
    if samples.is_empty() {
        log.warn(Stage::Pipeline, format_args!("no samples to process"));
        return PipelineOutput::default();
    }
    log.info(
        Stage::Pipeline,
        format_args!("processing {} samples as of {}", samples.len(), now),
    );

    let cleaned = detect_outliers(samples, config.outlier.window, config.outlier.threshold, log);
    let filled = fill_gaps(cleaned, config.gap_fill.max_delta, log);

    let before = filled.len();
    let valid: Vec<WaterSample> = filled.into_iter().filter(|s| !s.is_sentinel()).collect();
    if valid.len() < before {
        log.info(
            Stage::Pipeline,
            format_args!("dropped {} invalid samples", before - valid.len()),
        );
    }

    let smoother = smoother_for(&config.extrema.smoothing);
    let detected = detect_extrema(&valid, &config.extrema, smoother.as_ref(), log);
    let deduplicated = remove_duplicate_runs(detected, &valid);
    let events = remove_close_events(
        deduplicated,
        &valid,
        config.consolidation.height,
        config.consolidation.width,
        log,
    );
    log.info(
        Stage::Pipeline,
        format_args!("{} events after consolidation", events.len()),
    );

    let points = assign_trends(&valid, now, &config.trend, log);

    PipelineOutput {
        samples: valid,
        events,
        points,
    }
}

/// Convenience wrapper returning only the report points.
pub fn report_points(
    samples: Vec<WaterSample>,
    now: NaiveDateTime,
    config: &PipelineConfig,
    log: &dyn PipelineLog,
) -> Vec<ReportPoint> {
    run(samples, now, config, log).points
}
