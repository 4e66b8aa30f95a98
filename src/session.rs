// Per-session analysis orchestration and the batch boundary

use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Serialize;

use crate::analysis::{KpiAggregator, KpiReport, LapPerformanceAnalyzer, TelemetryQualityAnalyzer};
use crate::errors::LapsmithError;
use crate::ingest::{
    DRIVER_INPUTS_FILE, LAP_TABLE_FILE, TableStore, extract_lap_sheet, extract_session_metadata,
    extract_telemetry_trace,
};

/// Runs the full pipeline for one session: table ingestion, the two
/// order-free analyzers, and KPI aggregation. Each call is self-contained;
/// no state is shared across sessions, so callers may analyze many
/// sessions in parallel.
pub struct SessionAnalyzer {
    session_path: PathBuf,
    shared_tables_path: Option<PathBuf>,
}

impl SessionAnalyzer {
    pub fn new(session_path: &Path, shared_tables_path: Option<&Path>) -> Self {
        Self {
            session_path: session_path.to_path_buf(),
            shared_tables_path: shared_tables_path.map(Path::to_path_buf),
        }
    }

    /// Produce the session scorecard. Missing or malformed tables degrade
    /// to empty analyses; the only hard failure is a session directory
    /// that does not exist at all.
    pub fn analyze(&self) -> Result<KpiReport, LapsmithError> {
        if !self.session_path.exists() {
            return Err(LapsmithError::NoSessionDirectory {
                path: self.session_path.clone(),
            });
        }

        let store = TableStore::new(&self.session_path, self.shared_tables_path.as_deref());
        info!("analyzing session {}", store.session_id());

        let lap_sheet = store
            .load(LAP_TABLE_FILE)
            .map(|table| extract_lap_sheet(&table, store.session_id()))
            .unwrap_or_else(|| crate::ingest::LapSheet::empty(store.session_id()));

        let raw_telemetry = store.load(DRIVER_INPUTS_FILE);
        let metadata = extract_session_metadata(
            raw_telemetry.as_ref(),
            store.session_id(),
            &store.session_path().display().to_string(),
        );
        let trace = raw_telemetry.as_ref().map(extract_telemetry_trace);
        let vehicle_tables = store.load_vehicle_tables();

        let lap_analysis = LapPerformanceAnalyzer::new(&lap_sheet).analyze();
        let input_quality = trace
            .as_ref()
            .map(|trace| TelemetryQualityAnalyzer::new(trace).analyze());

        let vehicle = (!vehicle_tables.is_empty()).then_some(&vehicle_tables);
        let report =
            KpiAggregator::new(metadata).build_report(&lap_analysis, vehicle, input_quality.as_ref());
        Ok(report)
    }
}

/// Outcome of one session within a batch run.
#[derive(Clone, Debug, Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub success: bool,
}

/// Analyze a batch of sessions. A failing session is logged and reported
/// as unsuccessful; its siblings always run.
pub fn analyze_batch(
    sessions: &[PathBuf],
    shared_tables_path: Option<&Path>,
) -> Vec<(SessionOutcome, Option<KpiReport>)> {
    sessions
        .iter()
        .map(|session_path| {
            let session_id = session_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            match SessionAnalyzer::new(session_path, shared_tables_path).analyze() {
                Ok(report) => (
                    SessionOutcome {
                        session_id,
                        success: true,
                    },
                    Some(report),
                ),
                Err(e) => {
                    error!("session {session_id} failed: {e}");
                    (
                        SessionOutcome {
                            session_id,
                            success: false,
                        },
                        None,
                    )
                }
            }
        })
        .collect()
}
