//! Telegraphic report formatting.
//!
//! A full report is a single line of space-separated groups:
//!
//! ```text
//! <serial> 22 <DDHH> <trend groups> [<event groups>] 44 <DDHH> 30000=
//! ```
//!
//! Each report point is `{trend code}{level / 10:04}` and each event is
//! `HHMM 8LLLL` (peak) or `HHMM 9LLLL` (trough). Full reports are sent only
//! at synoptic hours; any other hour sends the heartbeat `checking`.

use crate::analysis::pipeline::PipelineOutput;
use crate::config::PipelineConfig;
use crate::ledger::{select_new_events, select_recent_events, EventLedger, LedgerError};
use crate::logging::{PipelineLog, Stage};
use crate::model::{EventSample, ExtremumKind, ReportPoint};
use chrono::{Duration, NaiveDateTime, Timelike};

pub const HEARTBEAT: &str = "checking";

const SECTION_LEVELS: &str = "22";
const SECTION_CLOSE: &str = "44";
const TERMINATOR: &str = "30000=";

fn packed_level(level: i32) -> String {
    format!("{:04}", level.div_euclid(10))
}

fn event_group(event: &EventSample) -> String {
    let marker = match event.kind {
        ExtremumKind::Peak => '8',
        ExtremumKind::Trough => '9',
    };
    format!("{} {}{}", event.timestamp.format("%H%M"), marker, packed_level(event.level))
}

pub fn is_synoptic_hour(now: NaiveDateTime, synoptic_hours: &[u32]) -> bool {
    synoptic_hours.contains(&now.hour())
}

/// Formats a full report. `events` are emitted in the order given.
pub fn format_report(serial: &str, now: NaiveDateTime, points: &[ReportPoint], events: &[EventSample]) -> String {
    let day_hour = now.format("%d%H").to_string();

    let mut groups = vec![serial.to_string(), SECTION_LEVELS.to_string(), day_hour.clone()];
    groups.extend(points.iter().map(|p| format!("{}{}", p.trend(), packed_level(p.level()))));
    groups.extend(events.iter().map(event_group));
    groups.extend([SECTION_CLOSE.to_string(), day_hour, TERMINATOR.to_string()]);
    groups.join(" ")
}

/// A composed report and whether it is due at this hour.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub text: String,
    pub synoptic: bool,
}

impl Report {
    /// What gets sent: the full text at synoptic hours, the heartbeat otherwise.
    pub fn message(&self) -> &str {
        if self.synoptic { self.text.as_str() } else { HEARTBEAT }
    }
}

/// Selects the events to report and formats the report for one run.
///
/// At synoptic hours events go through the ledger (and this run's events are
/// committed to it); at other hours only recent events are included and the
/// ledger is left untouched.
pub fn compose_report(
    output: &PipelineOutput,
    now: NaiveDateTime,
    config: &PipelineConfig,
    ledger: &mut dyn EventLedger,
    log: &dyn PipelineLog,
) -> Result<Report, LedgerError> {
    let synoptic = is_synoptic_hour(now, &config.station.synoptic_hours);
    let events = output.event_samples();

    let selected = if synoptic {
        select_new_events(
            &events,
            now,
            Duration::minutes(config.report.ledger_window_minutes),
            ledger,
            log,
        )?
    } else {
        select_recent_events(
            &events,
            now,
            Duration::minutes(config.report.recent_event_minutes),
            log,
        )
    };

    for event in &selected {
        log.info(
            Stage::Report,
            format_args!("add {} at {} level {}", event.kind, event.timestamp.format("%H:%M"), event.level),
        );
    }

    let text = format_report(&config.station.serial_number, now, &output.points, &selected);
    log.info(Stage::Report, format_args!("report: {}", text));
    if !synoptic {
        log.info(
            Stage::Report,
            format_args!("{:02}h is not a synoptic hour, sending heartbeat", now.hour()),
        );
    }
    Ok(Report { text, synoptic })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::logging::NullLog;
    use crate::model::{ExtremumEvent, Trend, WaterSample};
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 7)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn points() -> Vec<ReportPoint> {
        vec![
            ReportPoint::new(at(9, 0), 1520, Trend::Rising),
            ReportPoint::new(at(11, 0), 1515, Trend::Falling),
            ReportPoint::new(at(13, 0), 1515, Trend::Steady),
        ]
    }

    #[test]
    fn test_report_without_events() {
        let report = format_report("74194", at(13, 0), &points(), &[]);
        assert_eq!(report, "74194 22 0713 20152 10151 00151 44 0713 30000=");
    }

    #[test]
    fn test_report_with_events() {
        let events = vec![
            EventSample { timestamp: at(8, 40), level: 1534, kind: ExtremumKind::Peak },
            EventSample { timestamp: at(12, 10), level: 987, kind: ExtremumKind::Trough },
        ];
        let report = format_report("74194", at(13, 0), &points()[2..], &events);
        assert_eq!(report, "74194 22 0713 00151 0840 80153 1210 90098 44 0713 30000=");
    }

    #[test]
    fn test_report_with_no_points() {
        assert_eq!(format_report("1", at(1, 0), &[], &[]), "1 22 0701 44 0701 30000=");
    }

    #[test]
    fn test_synoptic_hours() {
        let hours = [1, 7, 13, 19];
        assert!(is_synoptic_hour(at(7, 0), &hours));
        assert!(is_synoptic_hour(at(19, 59), &hours));
        assert!(!is_synoptic_hour(at(8, 0), &hours));
        assert!(!is_synoptic_hour(at(0, 0), &hours));
    }

    // --- compose ----------------------------------------------------------------------------

    fn output_with_peak(peak_at: NaiveDateTime) -> PipelineOutput {
        PipelineOutput {
            samples: vec![WaterSample::new(Some(1), peak_at, 1600)],
            events: vec![ExtremumEvent::peak(0)],
            points: points(),
        }
    }

    #[test]
    fn test_heartbeat_outside_synoptic_hours() {
        let mut ledger = MemoryLedger::new();
        let output = output_with_peak(at(12, 0));
        let report = compose_report(&output, at(14, 0), &PipelineConfig::default(), &mut ledger, &NullLog).unwrap();

        assert!(!report.synoptic);
        assert_eq!(report.message(), HEARTBEAT);
        assert!(report.text.contains("1200 80160"), "draft still carries recent events");
        assert!(!ledger.is_seen(ExtremumKind::Peak, output.event_samples()[0].key()));
    }

    #[test]
    fn test_synoptic_report_goes_through_ledger() {
        let mut ledger = MemoryLedger::new();
        let output = output_with_peak(at(12, 0));
        let config = PipelineConfig::default();

        let first = compose_report(&output, at(13, 0), &config, &mut ledger, &NullLog).unwrap();
        assert!(first.synoptic);
        assert!(first.message().contains("1200 80160"));

        let second = compose_report(&output, at(19, 0), &config, &mut ledger, &NullLog).unwrap();
        assert!(!second.message().contains("80160"), "already reported");
    }
}
