//! Common types and constants used across the pipeline

use chrono::{DateTime, Utc};

/// Provenance tag for values read from the NOAA SWPC feeds
pub const SOURCE_NOAA: &str = "NOAA SWPC";

/// Provenance tag for values read from the N0NBH solar XML
pub const SOURCE_N0NBH: &str = "N0NBH";

/// Provenance tag for SIDC sunspot bulletins
pub const SOURCE_SIDC: &str = "SIDC";

/// Amateur bands covered by the report, in display order
pub const BAND_ORDER: [&str; 9] = [
    "80m", "40m", "20m", "17m", "15m", "12m", "10m", "6m", "VHF+",
];

/// Leading component of every report folder name
pub const REPORT_FOLDER_PREFIX: &str = "PropagationReport-";

/// Folder path for the bundle observed at `timestamp`.
///
/// `YYYY/MM/DD/PropagationReport-YYYY-MM-DD-HH-MM-SS`, zero-padded UTC.
/// Sub-second precision is discarded, so two timestamps within the same
/// second share a folder.
pub fn report_folder_path(timestamp: DateTime<Utc>) -> String {
    timestamp
        .format("%Y/%m/%d/PropagationReport-%Y-%m-%d-%H-%M-%S")
        .to_string()
}

/// Whether `path` names a report folder (`.../PropagationReport-...`)
pub fn is_report_folder(path: &str) -> bool {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|segment| segment.starts_with(REPORT_FOLDER_PREFIX))
        .unwrap_or(false)
}
