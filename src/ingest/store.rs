// Resolution and loading of a session's exported table files

use std::path::{Path, PathBuf};

use log::warn;

use super::table::SessionTable;

/// Subdirectory of a session folder that holds the exported tables.
pub const TABLES_DIR: &str = "TABLES";

/// Export name of the lap/sector timing table.
pub const LAP_TABLE_FILE: &str = "Time Report - Track Sections (All Laps).csv";

/// Export name of the continuous driver-input table.
pub const DRIVER_INPUTS_FILE: &str = "driverinputs.csv";

/// Vehicle subsystem tables, loaded by fixed export name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleSystem {
    Fuel,
    TireTempsLeft,
    TireTempsRight,
    AeroMap,
    Engine,
    Suspension,
}

impl VehicleSystem {
    pub const ALL: [VehicleSystem; 6] = [
        VehicleSystem::Fuel,
        VehicleSystem::TireTempsLeft,
        VehicleSystem::TireTempsRight,
        VehicleSystem::AeroMap,
        VehicleSystem::Engine,
        VehicleSystem::Suspension,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            VehicleSystem::Fuel => "fuel.csv",
            VehicleSystem::TireTempsLeft => "LeftsideTireTemps.csv",
            VehicleSystem::TireTempsRight => "rightsidetiretemps.csv",
            VehicleSystem::AeroMap => "aeromap.csv",
            VehicleSystem::Engine => "engineoverview.csv",
            VehicleSystem::Suspension => "Suspension Histogram.csv",
        }
    }
}

/// The vehicle subsystem tables found for a session. A missing file is
/// simply None for that subsystem.
#[derive(Clone, Debug, Default)]
pub struct VehicleTables {
    pub fuel: Option<SessionTable>,
    pub tire_temps_left: Option<SessionTable>,
    pub tire_temps_right: Option<SessionTable>,
    pub aero_map: Option<SessionTable>,
    pub engine: Option<SessionTable>,
    pub suspension: Option<SessionTable>,
}

impl VehicleTables {
    pub fn is_empty(&self) -> bool {
        self.fuel.is_none()
            && self.tire_temps_left.is_none()
            && self.tire_temps_right.is_none()
            && self.aero_map.is_none()
            && self.engine.is_none()
            && self.suspension.is_none()
    }
}

/// Resolves table files for one session: the session-local `TABLES/`
/// directory first, then an optional shared directory for files common to
/// several sessions.
pub struct TableStore {
    session_path: PathBuf,
    session_tables_path: PathBuf,
    shared_tables_path: Option<PathBuf>,
    session_id: String,
}

impl TableStore {
    pub fn new(session_path: &Path, shared_tables_path: Option<&Path>) -> Self {
        let session_id = session_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            session_path: session_path.to_path_buf(),
            session_tables_path: session_path.join(TABLES_DIR),
            shared_tables_path: shared_tables_path.map(Path::to_path_buf),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Resolve a table file name to a path, preferring the session-local
    /// store over the shared one. None when neither has the file.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let local = self.session_tables_path.join(file_name);
        if local.exists() {
            return Some(local);
        }
        if let Some(shared) = &self.shared_tables_path {
            let fallback = shared.join(file_name);
            if fallback.exists() {
                return Some(fallback);
            }
        }
        None
    }

    /// Load a table by export name. Missing or unreadable files degrade to
    /// None: a session without a given export still gets analyzed.
    pub fn load(&self, file_name: &str) -> Option<SessionTable> {
        let Some(path) = self.resolve(file_name) else {
            warn!("table file not found in session or shared store: {file_name}");
            return None;
        };
        match SessionTable::from_csv_file(&path) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("failed to load table {path:?}: {e}");
                None
            }
        }
    }

    /// Load every vehicle subsystem table that exists for this session.
    pub fn load_vehicle_tables(&self) -> VehicleTables {
        let mut tables = VehicleTables::default();
        for system in VehicleSystem::ALL {
            let loaded = self.load(system.file_name());
            match system {
                VehicleSystem::Fuel => tables.fuel = loaded,
                VehicleSystem::TireTempsLeft => tables.tire_temps_left = loaded,
                VehicleSystem::TireTempsRight => tables.tire_temps_right = loaded,
                VehicleSystem::AeroMap => tables.aero_map = loaded,
                VehicleSystem::Engine => tables.engine = loaded,
                VehicleSystem::Suspension => tables.suspension = loaded,
            }
        }
        tables
    }
}
