// Driver-input telemetry extraction from exported tables

use log::warn;
use serde::{Deserialize, Serialize};

use super::shape::{ChannelHeaderDetector, TableShapeDetector};
use super::table::SessionTable;

/// Marker found in the first header cell of a known degenerate export where
/// every channel name was concatenated into a single cell.
const CONCATENATED_HEADER_MARKER: &str = "TimeThrottleBrakeSteering";

/// Channel names substituted for the concatenated-header case, in the
/// column order that export is known to use.
const FALLBACK_CHANNELS: [&str; 7] = [
    "Time",
    "Throttle",
    "Brake",
    "SteeringWheelAngle",
    "LatAccelms2",
    "LongAccelms2",
    "YawRate",
];

/// Alias table from squashed lowercase header names to canonical channel
/// names. Unmapped names pass through unchanged.
const CHANNEL_ALIASES: [(&str, &str); 10] = [
    ("time", "Time"),
    ("throttle", "Throttle"),
    ("brake", "Brake"),
    ("steeringangle", "SteeringAngle"),
    ("steering", "SteeringAngle"),
    ("speed", "Speed"),
    ("distance", "Distance"),
    ("lataccelms2", "LatAccel"),
    ("longaccelms2", "LongAccel"),
    ("yawrate", "YawRate"),
];

/// One named channel of the trace, in sample order. Values that failed
/// numeric coercion are None.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryChannel {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Columnar driver-input trace with canonical channel names.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelemetryTrace {
    channels: Vec<TelemetryChannel>,
    sample_count: usize,
}

impl TelemetryTrace {
    pub fn channel(&self, name: &str) -> Option<&[Option<f64>]> {
        self.channels
            .iter()
            .find(|channel| channel.name == name)
            .map(|channel| channel.values.as_slice())
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|channel| channel.name == name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Strip everything but alphanumerics and lowercase, for alias lookup.
fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn canonical_name(cleaned: &str) -> String {
    let key = squash(cleaned);
    CHANNEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| cleaned.to_string())
}

/// Work out the column names for the data region from the detected header
/// row, handling the concatenated-header degenerate case and header/width
/// mismatches.
fn resolve_channel_names(header: &[String], width: usize) -> Vec<String> {
    if header
        .first()
        .is_some_and(|cell| cell.contains(CONCATENATED_HEADER_MARKER))
    {
        if width >= FALLBACK_CHANNELS.len() {
            // known export bug: substitute the fixed list, keep any trailing
            // columns under synthetic names
            return FALLBACK_CHANNELS
                .iter()
                .map(|name| name.to_string())
                .chain((FALLBACK_CHANNELS.len()..width).map(|i| format!("col_{i}")))
                .collect();
        }
        warn!(
            "concatenated telemetry header with only {width} data columns, using synthetic names"
        );
        return (0..width).map(|i| format!("col_{i}")).collect();
    }

    let cleaned: Vec<String> = header
        .iter()
        .map(|cell| {
            cell.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .collect();
    if cleaned.len() == width {
        cleaned
    } else {
        warn!(
            "telemetry header length ({}) does not match column count ({width}), using synthetic names",
            cleaned.len()
        );
        (0..width).map(|i| format!("col_{i}")).collect()
    }
}

/// Extract the driver-input trace from a raw telemetry table using the
/// default channel-header detector.
pub fn extract_telemetry_trace(table: &SessionTable) -> TelemetryTrace {
    extract_telemetry_trace_with(&ChannelHeaderDetector, table)
}

/// Extract the driver-input trace with a caller-provided shape detector.
/// Channel names are canonicalized through the alias table and every value
/// is coerced to f64; coercion failures become None rather than aborting
/// the load. An undetectable header yields an empty trace.
pub fn extract_telemetry_trace_with(
    detector: &dyn TableShapeDetector,
    table: &SessionTable,
) -> TelemetryTrace {
    let Some(region) = detector.locate(table) else {
        warn!("could not find telemetry header row");
        return TelemetryTrace::default();
    };

    let data_rows = &table.rows()[region.data_start..];
    let width = data_rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return TelemetryTrace::default();
    }

    let header = &table.rows()[region.header_row];
    let channels: Vec<TelemetryChannel> = resolve_channel_names(header, width)
        .into_iter()
        .enumerate()
        .map(|(col, name)| TelemetryChannel {
            name: canonical_name(&name),
            values: data_rows
                .iter()
                .map(|row| row.get(col).and_then(|cell| cell.trim().parse::<f64>().ok()))
                .collect(),
        })
        .collect();

    TelemetryTrace {
        sample_count: data_rows.len(),
        channels,
    }
}
