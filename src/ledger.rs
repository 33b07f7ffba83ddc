//! Already-reported event ledger.
//!
//! The pipeline itself keeps nothing between runs. To avoid reporting the
//! same peak or trough at every synoptic hour, the caller supplies an
//! `EventLedger` that remembers the event keys seen by the previous run.
//! Each commit overwrites the ledger with the current run's events.

use crate::logging::{PipelineLog, Stage};
use crate::model::{EventSample, ExtremumKind};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait EventLedger {
    /// Whether an event of `kind` with this key was committed by the last run.
    fn is_seen(&self, kind: ExtremumKind, key: i64) -> bool;

    /// Replaces the stored keys with this run's peaks and troughs.
    fn commit(&mut self, peaks: &[i64], troughs: &[i64]) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    peaks: HashSet<i64>,
    troughs: HashSet<i64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLedger for MemoryLedger {
    fn is_seen(&self, kind: ExtremumKind, key: i64) -> bool {
        match kind {
            ExtremumKind::Peak => self.peaks.contains(&key),
            ExtremumKind::Trough => self.troughs.contains(&key),
        }
    }

    fn commit(&mut self, peaks: &[i64], troughs: &[i64]) -> Result<(), LedgerError> {
        self.peaks = peaks.iter().copied().collect();
        self.troughs = troughs.iter().copied().collect();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file ledger
// ---------------------------------------------------------------------------

/// On-disk shape: `{"peaks": [...], "troughs": [...]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct LedgerRecord {
    #[serde(default)]
    peaks: Vec<i64>,
    #[serde(default)]
    troughs: Vec<i64>,
}

/// Ledger persisted as a small JSON file. A missing file is an empty ledger.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    record: LedgerRecord,
}

impl JsonFileLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let record = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| LedgerError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&contents)?
        } else {
            LedgerRecord::default()
        };
        Ok(Self { path, record })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLedger for JsonFileLedger {
    fn is_seen(&self, kind: ExtremumKind, key: i64) -> bool {
        match kind {
            ExtremumKind::Peak => self.record.peaks.contains(&key),
            ExtremumKind::Trough => self.record.troughs.contains(&key),
        }
    }

    fn commit(&mut self, peaks: &[i64], troughs: &[i64]) -> Result<(), LedgerError> {
        let record = LedgerRecord {
            peaks: peaks.to_vec(),
            troughs: troughs.to_vec(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&self.path, json).map_err(|source| LedgerError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        self.record = record;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Synoptic-hour selection: events newer than `window` that the ledger has
/// not seen, in chronological order. Every event of this run is committed,
/// reported or not.
pub fn select_new_events(
    events: &[EventSample],
    now: NaiveDateTime,
    window: Duration,
    ledger: &mut dyn EventLedger,
    log: &dyn PipelineLog,
) -> Result<Vec<EventSample>, LedgerError> {
    let cutoff = now - window;
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.timestamp);

    let mut fresh = Vec::new();
    for event in sorted.into_iter().filter(|e| e.timestamp > cutoff) {
        if ledger.is_seen(event.kind, event.key()) {
            log.info(
                Stage::Ledger,
                format_args!("skipping {} at {} already reported", event.kind, event.timestamp.format("%Y-%m-%d %H:%M")),
            );
        } else {
            fresh.push(event);
        }
    }

    let keys_of = |kind: ExtremumKind| -> Vec<i64> {
        events.iter().filter(|e| e.kind == kind).map(|e| e.key()).collect()
    };
    ledger.commit(&keys_of(ExtremumKind::Peak), &keys_of(ExtremumKind::Trough))?;

    Ok(fresh)
}

/// Off-hour selection: events no older than `max_age`, in chronological order.
pub fn select_recent_events(
    events: &[EventSample],
    now: NaiveDateTime,
    max_age: Duration,
    log: &dyn PipelineLog,
) -> Vec<EventSample> {
    let cutoff = now - max_age;
    let mut recent: Vec<EventSample> = events
        .iter()
        .filter(|e| {
            let keep = e.timestamp >= cutoff;
            if !keep {
                log.debug(
                    Stage::Ledger,
                    format_args!("dropping {} at {} older than {}", e.kind, e.timestamp, cutoff),
                );
            }
            keep
        })
        .cloned()
        .collect();
    recent.sort_by_key(|e| e.timestamp);
    recent
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
