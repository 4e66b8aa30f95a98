// Best-effort session metadata extraction from table header rows

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::table::SessionTable;

/// Sentinel for metadata fields the export did not carry.
pub const UNKNOWN: &str = "Unknown";

/// Leading rows scanned for quoted key/value markers.
const METADATA_SCAN_ROWS: usize = 10;

static VENUE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""Venue","([^"]+)""#).unwrap());
static VEHICLE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""Vehicle","([^"]+)""#).unwrap());
static DRIVER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""Driver","([^"]+)""#).unwrap());

/// Session identity extracted from the telemetry export's leading metadata
/// rows. Every field is best-effort: missing values default to "Unknown"
/// rather than failing the load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub session_id: String,
    pub track: String,
    pub vehicle: String,
    pub driver: String,
    pub session_path: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            session_id: UNKNOWN.to_string(),
            track: UNKNOWN.to_string(),
            vehicle: UNKNOWN.to_string(),
            driver: UNKNOWN.to_string(),
            session_path: String::new(),
        }
    }
}

/// Scan the first rows of the raw driver-input table for the quoted
/// `"Venue"` / `"Vehicle"` / `"Driver"` markers. First match wins per key.
pub fn extract_session_metadata(
    raw_telemetry: Option<&SessionTable>,
    session_id: &str,
    session_path: &str,
) -> SessionMetadata {
    let mut metadata = SessionMetadata {
        session_id: session_id.to_string(),
        session_path: session_path.to_string(),
        ..Default::default()
    };

    let Some(table) = raw_telemetry else {
        return metadata;
    };

    for row in table.rows().iter().take(METADATA_SCAN_ROWS) {
        let Some(cell) = row.first() else { continue };
        if metadata.track == UNKNOWN {
            if let Some(captures) = VENUE_MARKER.captures(cell) {
                metadata.track = captures[1].to_string();
                continue;
            }
        }
        if metadata.vehicle == UNKNOWN {
            if let Some(captures) = VEHICLE_MARKER.captures(cell) {
                metadata.vehicle = captures[1].to_string();
                continue;
            }
        }
        if metadata.driver == UNKNOWN {
            if let Some(captures) = DRIVER_MARKER.captures(cell) {
                metadata.driver = captures[1].to_string();
            }
        }
    }
    metadata
}
