/// Water-level conditioning and event detection.
///
/// Submodules, in pipeline order:
/// - `outliers`    — neighbourhood-median spike rejection.
/// - `gaps`        — next-sample validation and gap interpolation.
/// - `smoothing`   — optional pre-smoothing for the extremum search.
/// - `extrema`     — relative/absolute peak and trough detection.
/// - `consolidate` — duplicate-run and close-event merging.
/// - `trend`       — report anchors and their trend codes.
/// - `pipeline`    — runs all of the above in order.

pub mod consolidate;
pub mod extrema;
pub mod gaps;
pub mod outliers;
pub mod pipeline;
pub mod smoothing;
pub mod trend;
