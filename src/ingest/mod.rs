// Table ingestion: loading exported session tables and extracting typed
// lap, telemetry, and metadata records from them.

pub(crate) mod lap_table;
pub(crate) mod metadata;
pub(crate) mod shape;
pub(crate) mod store;
pub(crate) mod table;
pub(crate) mod telemetry_table;

pub use lap_table::{LapRecord, LapSheet, SectorSplit, extract_lap_sheet, parse_time_token};
pub use metadata::{SessionMetadata, UNKNOWN, extract_session_metadata};
pub use shape::{ChannelHeaderDetector, SectorKeywordDetector, TableRegion, TableShapeDetector};
pub use store::{
    DRIVER_INPUTS_FILE, LAP_TABLE_FILE, TABLES_DIR, TableStore, VehicleSystem, VehicleTables,
};
pub use table::SessionTable;
pub use telemetry_table::{TelemetryChannel, TelemetryTrace, extract_telemetry_trace};
