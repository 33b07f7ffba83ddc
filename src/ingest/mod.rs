/// Upstream telemetry sources.
///
/// `telemetry` decodes the station's JSON feed into `WaterSample`s and can
/// fetch it over HTTP. Each further source gets its own file here.

pub mod telemetry;

#[cfg(test)]
pub(crate) mod fixtures;
