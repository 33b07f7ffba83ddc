/// wlmon_service: water-level telemetry conditioning and trend reporting.
///
/// # Module structure
///
/// ```text
/// wlmon_service
/// ├── model       — shared data types (WaterSample, ExtremumEvent, ReportPoint, …)
/// ├── config      — pipeline tuning and station configuration (pipeline.toml)
/// ├── logging     — injected stage logger with tracing and in-memory backends
/// ├── ingest
/// │   ├── telemetry — upstream JSON payload decoding + HTTP fetch
/// │   └── fixtures (test only) — representative payloads
/// ├── analysis
/// │   ├── outliers    — median-based spike rejection
/// │   ├── gaps        — gap validation and interpolation
/// │   ├── smoothing   — optional Savitzky-Golay pre-smoothing
/// │   ├── extrema     — peak/trough detection
/// │   ├── consolidate — event de-duplication and merging
/// │   ├── trend       — report anchors and trend codes
/// │   └── pipeline    — end-to-end run
/// ├── ledger      — already-reported event store (memory / JSON file)
/// └── report      — telegraphic report formatting and schedule
/// ```

/// Public modules
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod report;
