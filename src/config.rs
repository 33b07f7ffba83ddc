//! Pipeline configuration loader - parses pipeline.toml
//!
//! Keeps every tunable of the pipeline and its collaborators out of the
//! code, so that a deployment can retune prominence, merge distances or the
//! report anchors without recompiling. Every field has a default, so a
//! partial file (or no file at all) is valid.

use crate::analysis::outliers;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config path used when `WLMON_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root of pipeline.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub outlier: OutlierConfig,
    pub gap_fill: GapFillConfig,
    pub extrema: ExtremaConfig,
    pub consolidation: ConsolidationConfig,
    pub trend: TrendConfig,
    pub station: StationConfig,
    pub report: ReportConfig,
    pub source: SourceConfig,
}

/// Median outlier rejection
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub window: usize,
    pub threshold: i32,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            window: outliers::DEFAULT_WINDOW,
            threshold: outliers::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    /// Largest accepted level change per 10-minute step.
    pub max_delta: i32,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self { max_delta: 100 }
    }
}

/// Optional smoothing applied before the extremum search.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmoothingConfig {
    #[default]
    None,
    SavitzkyGolay { window: usize, polyorder: usize },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Odd window size for the windowed-prominence search.
    pub window: usize,
    /// Minimum prominence on both sides of a candidate.
    pub delta: i32,
    pub absolute_half_window_minutes: i64,
    pub trailing_lookback_minutes: i64,
    pub trailing_margin_minutes: i64,
    pub smoothing: SmoothingConfig,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        Self {
            window: 21,
            delta: 20,
            absolute_half_window_minutes: 90,
            trailing_lookback_minutes: 180,
            trailing_margin_minutes: 30,
            smoothing: SmoothingConfig::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Largest level gap between merged neighbours.
    pub height: i32,
    /// Largest index gap between merged neighbours.
    pub width: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self { height: 50, width: 40 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Anchor offsets before "now", oldest first. The last one is the
    /// "now" anchor and picks the closest sample instead of the earliest.
    pub anchor_offsets_minutes: [i64; 3],
    pub reference_lookback_minutes: i64,
    pub slack_minutes: i64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            anchor_offsets_minutes: [240, 120, 0],
            reference_lookback_minutes: 360,
            slack_minutes: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub serial_number: String,
    /// Station local time offset from UTC; telemetry timestamps are local.
    pub utc_offset_hours: i32,
    /// Local hours at which a full report is sent.
    pub synoptic_hours: Vec<u32>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial_number: "74194".to_string(),
            utc_offset_hours: 7,
            synoptic_hours: vec![1, 7, 13, 19],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Outside synoptic hours, events older than this are not reported.
    pub recent_event_minutes: i64,
    /// At synoptic hours, only events newer than this are checked against
    /// the ledger.
    pub ledger_window_minutes: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recent_event_minutes: 390,
            ledger_window_minutes: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 15,
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outlier.window < 2 {
            return Err(ConfigError::Invalid("outlier.window must be at least 2".into()));
        }
        if self.extrema.window < 3 || self.extrema.window % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "extrema.window must be odd and at least 3, got {}",
                self.extrema.window
            )));
        }
        if let SmoothingConfig::SavitzkyGolay { window, polyorder } = self.extrema.smoothing {
            if window % 2 == 0 || polyorder >= window {
                return Err(ConfigError::Invalid(format!(
                    "smoothing window must be odd and larger than polyorder, got window={} polyorder={}",
                    window, polyorder
                )));
            }
        }
        if self.gap_fill.max_delta < 0 || self.consolidation.height < 0 {
            return Err(ConfigError::Invalid("level tolerances must not be negative".into()));
        }
        let [oldest, middle, latest] = self.trend.anchor_offsets_minutes;
        if !(oldest > middle && middle > latest && latest >= 0) {
            return Err(ConfigError::Invalid(
                "trend.anchor_offsets_minutes must be strictly decreasing and non-negative".into(),
            ));
        }
        if self.trend.reference_lookback_minutes < oldest {
            return Err(ConfigError::Invalid(
                "trend.reference_lookback_minutes must cover the oldest anchor".into(),
            ));
        }
        if self.station.synoptic_hours.iter().any(|h| *h > 23) {
            return Err(ConfigError::Invalid("station.synoptic_hours must be 0-23".into()));
        }
        Ok(())
    }
}

/// Parses and validates a pipeline.toml document.
pub fn parse_config(contents: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Loads pipeline configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&contents)
}

/// Resolves the config path: `WLMON_CONFIG` (after loading `.env` if
/// present), else `pipeline.toml` in the working directory.
pub fn config_path_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    env::var("WLMON_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
