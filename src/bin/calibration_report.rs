//! Calibration report
//!
//! Reads the prediction log out of a JSON file store and prints the
//! calibration report as pretty JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use danci_scheduler::calibration::{CalibrationMonitor, PredictionLog};
use danci_scheduler::config::SchedulerConfig;
use danci_scheduler::logging::init_tracing;
use danci_scheduler::store::FileStore;

/// Calibration of the scheduler's recall predictions
#[derive(Parser, Debug)]
#[command(name = "calibration-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Print ECE / MAE / Brier calibration of logged recall predictions")]
struct Args {
    /// Path to the JSON file store holding the prediction log
    store_path: PathBuf,

    /// Only analyse the newest N predictions
    #[arg(long)]
    recent: Option<usize>,

    /// Number of equal-width probability bins (defaults to SCHEDULER_CALIBRATION_BINS)
    #[arg(long)]
    bins: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = SchedulerConfig::from_env();
    let _log_guard = init_tracing(&config.logging);

    let store = match FileStore::open(&args.store_path).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, path = %args.store_path.display(), "failed to open store");
            return ExitCode::FAILURE;
        }
    };

    let log = Arc::new(PredictionLog::with_capacity(store, config.prediction_log_capacity));
    let monitor = CalibrationMonitor::with_bins(log, args.bins.unwrap_or(config.calibration_bins));

    let report = match args.recent {
        Some(n) => monitor.analyze_recent(n).await,
        None => monitor.analyze().await,
    };
    tracing::info!(
        samples = report.sample_count,
        ece = report.ece,
        mae = report.mae,
        "calibration analysed"
    );

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to serialise report");
            ExitCode::FAILURE
        }
    }
}
