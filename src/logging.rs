//! Injected logging for the pipeline and its collaborators.
//!
//! Stages never reach for a global logger. Each one receives a
//! `&dyn PipelineLog` and records what it rejected, repaired or skipped.
//! Recording is fire-and-forget: it returns nothing and must not influence
//! the pipeline's result.
//!
//! `TracingLog` forwards to the `tracing` crate and is what the binary uses.
//! `NullLog` discards everything. `MemoryLog` keeps entries for assertions.

use std::cell::RefCell;
use std::fmt;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage Tags
// ---------------------------------------------------------------------------

/// Which part of the service emitted a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Outliers,
    GapFill,
    Extrema,
    Consolidate,
    Trend,
    Pipeline,
    Ingest,
    Ledger,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Outliers => write!(f, "OUTLIERS"),
            Stage::GapFill => write!(f, "GAPFILL"),
            Stage::Extrema => write!(f, "EXTREMA"),
            Stage::Consolidate => write!(f, "CONSOLIDATE"),
            Stage::Trend => write!(f, "TREND"),
            Stage::Pipeline => write!(f, "PIPELINE"),
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Ledger => write!(f, "LEDGER"),
            Stage::Report => write!(f, "REPORT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Log Sink
// ---------------------------------------------------------------------------

pub trait PipelineLog {
    fn record(&self, level: LogLevel, stage: Stage, message: fmt::Arguments<'_>);

    fn debug(&self, stage: Stage, message: fmt::Arguments<'_>) {
        self.record(LogLevel::Debug, stage, message);
    }

    fn info(&self, stage: Stage, message: fmt::Arguments<'_>) {
        self.record(LogLevel::Info, stage, message);
    }

    fn warn(&self, stage: Stage, message: fmt::Arguments<'_>) {
        self.record(LogLevel::Warning, stage, message);
    }
}

/// Forwards entries to `tracing`, tagging each with its stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl PipelineLog for TracingLog {
    fn record(&self, level: LogLevel, stage: Stage, message: fmt::Arguments<'_>) {
        let stage = stage.to_string();
        match level {
            LogLevel::Debug => tracing::debug!(stage = %stage, "{}", message),
            LogLevel::Info => tracing::info!(stage = %stage, "{}", message),
            LogLevel::Warning => tracing::warn!(stage = %stage, "{}", message),
            LogLevel::Error => tracing::error!(stage = %stage, "{}", message),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl PipelineLog for NullLog {
    fn record(&self, _level: LogLevel, _stage: Stage, _message: fmt::Arguments<'_>) {}
}

/// A single captured entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.level, self.stage, self.message)
    }
}

/// Keeps every entry in memory. The pipeline is single-threaded, so interior
/// mutability through `RefCell` is enough.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: RefCell<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Entries recorded by one stage at or above `min_level`.
    pub fn entries_for(&self, stage: Stage, min_level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.stage == stage && e.level >= min_level)
            .cloned()
            .collect()
    }
}

impl PipelineLog for MemoryLog {
    fn record(&self, level: LogLevel, stage: Stage, message: fmt::Arguments<'_>) {
        self.entries.borrow_mut().push(LogEntry {
            level,
            stage,
            message: message.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

/// Installs a console subscriber for `tracing`.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
