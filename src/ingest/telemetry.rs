/// Station telemetry feed client.
///
/// Decodes the upstream JSON report array into ascending `WaterSample`s and
/// fetches it over HTTP with bounded retry. See `fixtures.rs` for annotated
/// examples of the payload.

use crate::config::SourceConfig;
use crate::logging::{PipelineLog, Stage};
use crate::model::WaterSample;
use chrono::{NaiveDateTime, Timelike};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; WaterBot/1.0)";
const BACKOFF_BASE_MS: u64 = 500;
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("telemetry endpoint returned HTTP {0}")]
    Http(u16),
    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode telemetry payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry payload contained no usable samples")]
    NoData,
}

// ---------------------------------------------------------------------------
// Serde structures for the feed
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TelemetryRecord {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "thoigianReport")]
    reported_at: String,
    #[serde(rename = "mucNuoc")]
    level: Option<f64>,
    #[serde(default)]
    vol: Option<f64>,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .map(|ts| ts.with_second(0).unwrap_or(ts))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decodes a feed payload into samples sorted ascending by timestamp.
///
/// Records with a non-positive or missing level, or a timestamp in neither
/// supported format, are skipped. A repeated timestamp keeps the record that
/// appears first in the payload.
pub fn parse_payload(json: &str, log: &dyn PipelineLog) -> Result<Vec<WaterSample>, IngestError> {
    let records: Vec<TelemetryRecord> = serde_json::from_str(json)?;
    let total = records.len();

    let mut samples = Vec::with_capacity(total);
    let mut seen = HashSet::with_capacity(total);
    for record in records {
        let Some(timestamp) = parse_timestamp(&record.reported_at) else {
            log.warn(
                Stage::Ingest,
                format_args!("skipping record with bad timestamp {:?}", record.reported_at),
            );
            continue;
        };
        let level = record.level.map(|l| (l * 10.0).round() as i32).unwrap_or(0);
        if level <= 0 {
            log.debug(Stage::Ingest, format_args!("skipping dropout at {}", timestamp));
            continue;
        }
        if !seen.insert(timestamp) {
            log.debug(Stage::Ingest, format_args!("skipping repeated record at {}", timestamp));
            continue;
        }
        samples.push(WaterSample::new(record.id, timestamp, level).with_volume(record.vol.unwrap_or(0.0)));
    }

    // Feed is newest first
    samples.reverse();
    samples.sort_by_key(|s| s.timestamp);

    if samples.is_empty() {
        return Err(IngestError::NoData);
    }
    log.info(
        Stage::Ingest,
        format_args!("decoded {} samples from {} records", samples.len(), total),
    );
    Ok(samples)
}

/// Loads a JSON array of samples in the crate's own serialization.
pub fn parse_sample_file<P: AsRef<Path>>(path: P) -> Result<Vec<WaterSample>, IngestError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut samples: Vec<WaterSample> = serde_json::from_str(&contents)?;
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << attempt.min(6))
}

/// Fetches the raw feed body from `url`.
///
/// Transport errors and 429/5xx responses are retried up to
/// `config.max_retries` times with exponential backoff.
pub fn fetch_payload(url: &str, config: &SourceConfig, log: &dyn PipelineLog) -> Result<String, IngestError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(USER_AGENT)
        .build()?;

    let mut attempt = 0;
    loop {
        log.debug(Stage::Ingest, format_args!("GET {} (attempt {})", url, attempt + 1));
        let result = client
            .get(url)
            .header("Accept", "application/json, text/html;q=0.9, */*;q=0.8")
            .send();

        let retry_reason = match result {
            Ok(response) if response.status().is_success() => return Ok(response.text()?),
            Ok(response) => {
                let status = response.status().as_u16();
                if !is_retryable(status) || attempt >= config.max_retries {
                    return Err(IngestError::Http(status));
                }
                format!("HTTP {}", status)
            }
            Err(e) => {
                if attempt >= config.max_retries {
                    return Err(IngestError::Request(e));
                }
                e.to_string()
            }
        };

        let wait = backoff(attempt);
        log.warn(
            Stage::Ingest,
            format_args!("fetch failed ({}), retrying in {} ms", retry_reason, wait.as_millis()),
        );
        thread::sleep(wait);
        attempt += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use crate::logging::{LogLevel, MemoryLog, NullLog};
    use chrono::NaiveDate;
    use std::io::Write;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 17)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_clean_payload_ascending() {
        let samples = parse_payload(fixture_one_hour_json(), &NullLog).expect("should parse");

        assert_eq!(samples.len(), 7);
        assert_eq!(samples[0].timestamp, at(6, 0));
        assert_eq!(samples[6].timestamp, at(7, 0));
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_levels_scaled_to_tenths_and_rounded() {
        let samples = parse_payload(fixture_one_hour_json(), &NullLog).unwrap();
        assert_eq!(samples[6].level, 1523);
        // 151.96 rounds up
        assert_eq!(samples[2].level, 1520);
        assert_eq!(samples[2].aux_level_a, 1520);
        assert_eq!(samples[2].aux_level_b, 1520);
        assert_eq!(samples[6].id, Some(90412));
        assert!((samples[6].volume - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_dirty_records_are_skipped() {
        let log = MemoryLog::new();
        let samples = parse_payload(fixture_dirty_json(), &log).unwrap();

        let times: Vec<NaiveDateTime> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![at(6, 20), at(6, 30), at(7, 0)]);
        assert_eq!(samples[0].id, None, "record without id keeps no id");
        assert_eq!(samples[0].volume, 0.0);
        assert_eq!(log.entries_for(Stage::Ingest, LogLevel::Warning).len(), 1, "one bad timestamp");
    }

    #[test]
    fn test_repeated_timestamp_keeps_first_record_in_payload() {
        let samples = parse_payload(fixture_dirty_json(), &NullLog).unwrap();

        let repeated = samples.iter().find(|s| s.timestamp == at(6, 30)).unwrap();
        assert_eq!(repeated.id, Some(2));
        assert_eq!(repeated.level, 978);
    }

    #[test]
    fn test_all_dropouts_is_no_data() {
        let result = parse_payload(fixture_all_dropouts_json(), &NullLog);
        assert!(matches!(result, Err(IngestError::NoData)));
        assert!(matches!(parse_payload("[]", &NullLog), Err(IngestError::NoData)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = parse_payload("{\"not\": \"an array\"}", &NullLog);
        assert!(matches!(result, Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_seconds_are_truncated() {
        let json = r#"[{ "thoigianReport": "2025-06-17 07:00:42", "mucNuoc": 10.0 }]"#;
        let samples = parse_payload(json, &NullLog).unwrap();
        assert_eq!(samples[0].timestamp, at(7, 0));
    }

    #[test]
    fn test_sample_file_round_trip_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixture_sample_file_json().as_bytes()).unwrap();

        let samples = parse_sample_file(file.path()).expect("should load");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].aux_level_b, 1005);
        assert_eq!(samples[1].id, None);
        assert_eq!(samples[1].volume, 0.0);
    }

    #[test]
    fn test_missing_sample_file_is_io_error() {
        let result = parse_sample_file("/nonexistent/samples.json");
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_retry_policy() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable(status), "{} should be retried", status);
        }
        for status in [400, 401, 404, 501] {
            assert!(!is_retryable(status), "{} should not be retried", status);
        }
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(2), Duration::from_millis(2000));
    }
}
