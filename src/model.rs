//! Core data types for the water-level report service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O and no pipeline logic, only types and the small
//! helpers that keep their invariants.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reserved level marking a sample as known-invalid / unconfirmed.
///
/// Sentinel samples are excluded from median, bound and interpolation
/// computations but keep their position until interpolation replaces them
/// or the caller drops them.
pub const SENTINEL_LEVEL: i32 = -9999;

/// Nominal telemetry cadence in minutes.
pub const SAMPLE_CADENCE_MINUTES: i64 = 10;

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// A single water-level telemetry sample.
///
/// Levels are integers in tenths of the station's physical unit. The two
/// auxiliary channels are redundant sensor readings used by the gap filler
/// when the primary channel fails validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterSample {
    /// Upstream source id. `None` for samples synthesized by interpolation.
    #[serde(default)]
    pub id: Option<u64>,
    pub timestamp: NaiveDateTime,
    pub level: i32,
    pub aux_level_a: i32,
    pub aux_level_b: i32,
    #[serde(default)]
    pub volume: f64,
}

impl WaterSample {
    /// Builds a sample whose three level channels all carry `level`.
    pub fn new(id: Option<u64>, timestamp: NaiveDateTime, level: i32) -> Self {
        Self {
            id,
            timestamp,
            level,
            aux_level_a: level,
            aux_level_b: level,
            volume: 0.0,
        }
    }

    pub fn with_aux(mut self, aux_level_a: i32, aux_level_b: i32) -> Self {
        self.aux_level_a = aux_level_a;
        self.aux_level_b = aux_level_b;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// An interpolated sample: no source id, all channels equal.
    pub fn synthetic(timestamp: NaiveDateTime, level: i32, volume: f64) -> Self {
        Self::new(None, timestamp, level).with_volume(volume)
    }

    pub fn is_sentinel(&self) -> bool {
        self.level == SENTINEL_LEVEL
    }

    pub fn is_synthetic(&self) -> bool {
        self.id.is_none()
    }

    /// Marks every level channel as invalid.
    pub fn invalidate(&mut self) {
        self.level = SENTINEL_LEVEL;
        self.aux_level_a = SENTINEL_LEVEL;
        self.aux_level_b = SENTINEL_LEVEL;
    }
}

// ---------------------------------------------------------------------------
// Extremum events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    Peak,
    Trough,
}

impl fmt::Display for ExtremumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtremumKind::Peak => write!(f, "peak"),
            ExtremumKind::Trough => write!(f, "trough"),
        }
    }
}

/// A peak or trough, addressed by its index into the sample sequence it
/// was detected on. Only meaningful alongside that sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremumEvent {
    pub sample_index: usize,
    pub kind: ExtremumKind,
}

impl ExtremumEvent {
    pub fn peak(sample_index: usize) -> Self {
        Self { sample_index, kind: ExtremumKind::Peak }
    }

    pub fn trough(sample_index: usize) -> Self {
        Self { sample_index, kind: ExtremumKind::Trough }
    }
}

/// An extremum event resolved against its sample, detached from any index.
///
/// This is the shape handed to the ledger and the report formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSample {
    pub timestamp: NaiveDateTime,
    pub level: i32,
    pub kind: ExtremumKind,
}

impl EventSample {
    /// Identity used for cross-run de-duplication: the event's timestamp as
    /// unix seconds. Stable across runs even for interpolated samples.
    pub fn key(&self) -> i64 {
        self.timestamp.and_utc().timestamp()
    }
}

// ---------------------------------------------------------------------------
// Report points
// ---------------------------------------------------------------------------

/// Trend code attached to a report anchor. The numeric codes are part of
/// the report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Steady,
    Falling,
    Rising,
}

impl Trend {
    pub fn code(self) -> u8 {
        match self {
            Trend::Steady => 0,
            Trend::Falling => 1,
            Trend::Rising => 2,
        }
    }

    /// Classifies `level` against the level it is compared to.
    pub fn between(level: i32, compared_to: i32) -> Self {
        match level.cmp(&compared_to) {
            std::cmp::Ordering::Greater => Trend::Rising,
            std::cmp::Ordering::Less => Trend::Falling,
            std::cmp::Ordering::Equal => Trend::Steady,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A trend-annotated output point. Only the trend assigner creates these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPoint {
    timestamp: NaiveDateTime,
    level: i32,
    trend: Trend,
}

impl ReportPoint {
    pub(crate) fn new(timestamp: NaiveDateTime, level: i32, trend: Trend) -> Self {
        Self { timestamp, level, trend }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
