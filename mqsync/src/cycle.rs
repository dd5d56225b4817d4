//! One sync cycle: discover, then fetch → execute → classify each file in turn.

use anyhow::Error;
use tracing::{error, info, instrument, warn};

use crate::core::classifier::classify_output;
use crate::core::types::{CycleReport, FileReport, FileStatus, Signal};
use crate::discover::discover;
use crate::io::config::SyncConfig;
use crate::io::executor::CommandProcessor;
use crate::io::source::{RemoteSource, response_body};

/// Run a single cycle. Never fails: every error is logged and scoped to the
/// file (or, for discovery, the cycle) it occurred in.
#[instrument(skip_all)]
pub fn run_cycle<S: RemoteSource, P: CommandProcessor>(
    config: &SyncConfig,
    source: &S,
    processor: &P,
) -> CycleReport {
    let mut report = CycleReport::default();

    let paths = match discover(source, &config.location, &config.settings.suffix) {
        Ok(paths) => {
            info!(count = paths.len(), "discovered {} mqsc files", paths.len());
            paths
        }
        Err(err) => {
            error!(err = %format!("{err:#}"), "discovery failed");
            report.discovery_failed = true;
            Vec::new()
        }
    };

    for path in paths {
        let file = apply_file(config, source, processor, path);
        report.files.push(file);
    }

    info!(
        discovered = report.discovered(),
        applied = report.count(FileStatus::Applied),
        failed = report.count(FileStatus::Failed),
        skipped = report.count(FileStatus::Skipped),
        discovery_failed = report.discovery_failed,
        "cycle finished"
    );
    report
}

fn apply_file<S: RemoteSource, P: CommandProcessor>(
    config: &SyncConfig,
    source: &S,
    processor: &P,
    path: String,
) -> FileReport {
    let bytes = match source.fetch(&path, &config.location.reference) {
        Ok(bytes) => bytes,
        Err(err) => {
            log_fetch_error(&path, &err);
            return FileReport {
                path,
                status: FileStatus::Skipped,
                signal: None,
            };
        }
    };
    let batch = String::from_utf8_lossy(&bytes);

    info!(%path, "running commands in mqsc file: {path}");
    let outcome = match processor.execute(&config.queue_manager, &batch) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(%path, err = %format!("{err:#}"), "error running mqsc commands");
            return FileReport {
                path,
                status: FileStatus::Failed,
                signal: None,
            };
        }
    };

    if !outcome.success {
        error!(
            %path,
            exit_code = ?outcome.exit_code,
            timed_out = outcome.timed_out,
            output = %outcome.output,
            "error running mqsc commands"
        );
    }
    if outcome.truncated_bytes > 0 {
        warn!(%path, truncated = outcome.truncated_bytes, "engine output truncated");
    }

    let signal = classify_output(&outcome.output);
    match &signal {
        Signal::Success { signature } => {
            info!(%path, output = %signature, "mqsc commands ran, output: {signature}");
        }
        Signal::Unexpected { raw } => {
            warn!(%path, output = %raw, "unexpected command output: {raw}");
        }
    }

    FileReport {
        path,
        status: if outcome.success {
            FileStatus::Applied
        } else {
            FileStatus::Failed
        },
        signal: Some(signal),
    }
}

fn log_fetch_error(path: &str, err: &Error) {
    match response_body(err) {
        Some(body) => error!(path, err = %format!("{err:#}"), body, "failed to fetch mqsc file"),
        None => error!(path, err = %format!("{err:#}"), "failed to fetch mqsc file"),
    }
}
