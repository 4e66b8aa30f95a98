use std::{fs, io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info};

use lapsmith::errors::LapsmithError;
use lapsmith::session::{SessionAnalyzer, analyze_batch};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a single session directory and emit its scorecard
    Analyze {
        /// Session directory containing a TABLES folder
        #[arg(short, long)]
        session: PathBuf,

        /// Directory with shared table files used when a session lacks one
        #[arg(long)]
        shared: Option<PathBuf>,

        /// Write the scorecard JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyze every session directory under a root
    Batch {
        /// Directory whose child directories are sessions
        #[arg(short, long)]
        root: PathBuf,

        /// Directory with shared table files used when a session lacks one
        #[arg(long)]
        shared: Option<PathBuf>,

        /// Directory for per-session scorecard JSON files
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn write_report_json(report: &lapsmith::KpiReport, output: Option<&PathBuf>) -> Result<(), LapsmithError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| LapsmithError::ReportSerialize { source: e })?;
    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| LapsmithError::ReportIo { source: e })?;
            info!("scorecard written to {path:?}");
        }
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{json}").map_err(|e| LapsmithError::ReportIo { source: e })?;
        }
    }
    Ok(())
}

fn analyze(session: &PathBuf, shared: Option<&PathBuf>, output: Option<&PathBuf>) -> Result<(), LapsmithError> {
    let report = SessionAnalyzer::new(session, shared.map(PathBuf::as_path)).analyze()?;
    write_report_json(&report, output)
}

fn batch(
    root: &PathBuf,
    shared: Option<&PathBuf>,
    output_dir: Option<&PathBuf>,
) -> Result<(), LapsmithError> {
    let entries = fs::read_dir(root).map_err(|e| LapsmithError::TableIo {
        path: root.clone(),
        source: e,
    })?;
    let mut sessions: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    sessions.sort();

    if let Some(dir) = output_dir {
        fs::create_dir_all(dir).map_err(|e| LapsmithError::ReportIo { source: e })?;
    }

    let outcomes = analyze_batch(&sessions, shared.map(PathBuf::as_path));
    let mut succeeded = 0;
    for (outcome, report) in &outcomes {
        if outcome.success {
            succeeded += 1;
        }
        if let (Some(report), Some(dir)) = (report, output_dir) {
            let path = dir.join(format!("{}.json", outcome.session_id));
            write_report_json(report, Some(&path))?;
        }
    }
    info!(
        "batch complete: {succeeded}/{} sessions analyzed",
        outcomes.len()
    );
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    let result = match &cli.command {
        Commands::Analyze {
            session,
            shared,
            output,
        } => analyze(session, shared.as_ref(), output.as_ref()),
        Commands::Batch {
            root,
            shared,
            output_dir,
        } => batch(root, shared.as_ref(), output_dir.as_ref()),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
