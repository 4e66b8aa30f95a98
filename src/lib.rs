// Library interface for lapsmith
// This allows integration tests to access internal modules

pub mod analysis;
pub mod errors;
pub mod ingest;
pub mod session;

// Re-export commonly used types
pub use analysis::{
    InputQualityAnalysis, KpiAggregator, KpiReport, LapAnalysis, LapPerformanceAnalyzer,
    TelemetryQualityAnalyzer,
};
pub use errors::LapsmithError;
pub use ingest::{LapRecord, LapSheet, SessionMetadata, SessionTable, TableStore, TelemetryTrace};
pub use session::{SessionAnalyzer, SessionOutcome, analyze_batch};
