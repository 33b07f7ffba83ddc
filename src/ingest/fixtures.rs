/// Test fixtures: representative telemetry payloads from the station feed.
///
/// The feed is a JSON array of report records, newest first:
///
///   [{ "id": 90412, "thoigianReport": "2025-06-17T07:00:00", "mucNuoc": 152.3, "vol": 0.0 }, …]
///
///   .id             — upstream record id (optional)
///   .thoigianReport — local station time, no offset
///   .mucNuoc        — water level in whole units (float); level = round(mucNuoc × 10)
///   .vol            — accumulated volume (optional)
///
/// A level of zero or below means the gauge did not report.

/// One hour of clean data at 10-minute cadence, newest first.
#[cfg(test)]
pub(crate) fn fixture_one_hour_json() -> &'static str {
    r#"[
      { "id": 90412, "thoigianReport": "2025-06-17T07:00:00", "mucNuoc": 152.3, "vol": 12.5 },
      { "id": 90411, "thoigianReport": "2025-06-17T06:50:00", "mucNuoc": 152.1, "vol": 12.4 },
      { "id": 90410, "thoigianReport": "2025-06-17T06:40:00", "mucNuoc": 151.96, "vol": 12.4 },
      { "id": 90409, "thoigianReport": "2025-06-17T06:30:00", "mucNuoc": 151.8, "vol": 12.3 },
      { "id": 90408, "thoigianReport": "2025-06-17T06:20:00", "mucNuoc": 151.7, "vol": 12.2 },
      { "id": 90407, "thoigianReport": "2025-06-17T06:10:00", "mucNuoc": 151.5, "vol": 12.1 },
      { "id": 90406, "thoigianReport": "2025-06-17T06:00:00", "mucNuoc": 151.4, "vol": 12.0 }
    ]"#
}

/// Feed with a gauge dropout (zero level), an unparseable timestamp, a
/// second record at an already-seen timestamp and a record without id or volume.
#[cfg(test)]
pub(crate) fn fixture_dirty_json() -> &'static str {
    r#"[
      { "id": 5, "thoigianReport": "2025-06-17T07:00:00", "mucNuoc": 98.0 },
      { "id": 4, "thoigianReport": "2025-06-17T06:50:00", "mucNuoc": 0.0 },
      { "id": 3, "thoigianReport": "17/06/2025 06:40", "mucNuoc": 97.9 },
      { "id": 2, "thoigianReport": "2025-06-17T06:30:00", "mucNuoc": 97.8 },
      { "id": 1, "thoigianReport": "2025-06-17T06:30:00", "mucNuoc": 50.0 },
      { "thoigianReport": "2025-06-17T06:20:00", "mucNuoc": 97.7 }
    ]"#
}

/// Feed where every record is a dropout.
#[cfg(test)]
pub(crate) fn fixture_all_dropouts_json() -> &'static str {
    r#"[
      { "id": 2, "thoigianReport": "2025-06-17T07:00:00", "mucNuoc": 0.0 },
      { "id": 1, "thoigianReport": "2025-06-17T06:50:00", "mucNuoc": -1.0 }
    ]"#
}

/// Sample file in the crate's own serialization of `WaterSample`.
#[cfg(test)]
pub(crate) fn fixture_sample_file_json() -> &'static str {
    r#"[
      { "id": 1, "timestamp": "2025-06-17T06:50:00", "level": 1000, "aux_level_a": 1000, "aux_level_b": 1000, "volume": 1.5 },
      { "timestamp": "2025-06-17T07:00:00", "level": 1010, "aux_level_a": 1010, "aux_level_b": 1005 }
    ]"#
}
