// Error types for lapsmith

use snafu::Snafu;
use std::{io, path::PathBuf};

/// Failures that abort a session analysis.
///
/// Degraded inputs (missing tables, undetectable table shapes, unparseable
/// individual values) are not errors: the ingestor logs them and returns
/// empty/None results so the rest of the scorecard can still be computed.
/// Only real I/O and serialization problems surface here, and only the
/// batch boundary in `session` turns them into per-session outcomes.
#[derive(Debug, Snafu)]
pub enum LapsmithError {
    // Errors while locating and loading session tables
    #[snafu(display("Session directory does not exist: {path:?}"))]
    NoSessionDirectory { path: PathBuf },
    #[snafu(display("Error reading table file {path:?}"))]
    TableIo { path: PathBuf, source: io::Error },
    #[snafu(display("Error decoding table file {path:?}"))]
    TableDecode { path: PathBuf, source: csv::Error },

    // Errors while writing the scorecard artifact
    #[snafu(display("Error serializing session scorecard"))]
    ReportSerialize { source: serde_json::Error },
    #[snafu(display("Error writing session scorecard"))]
    ReportIo { source: io::Error },
}
