//! Command processor abstraction for applying a batch to the queue manager.
//!
//! The [`CommandProcessor`] trait decouples the sync cycle from the actual
//! engine (`runmqsc`). Tests use scripted processors that return predetermined
//! outcomes without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::types::ExecutionOutcome;
use crate::io::config::SyncConfig;
use crate::io::process::run_with_input;

/// Abstraction over the command-processing engine.
pub trait CommandProcessor {
    /// Apply `batch` to `target`. Returns `Err` only if the engine could not be run;
    /// a nonzero exit is reported through [`ExecutionOutcome::success`].
    fn execute(&self, target: &str, batch: &str) -> Result<ExecutionOutcome>;
}

/// Resolve the engine executable through `PATH` (or as given, if it is a path).
pub fn locate_engine(program: &str) -> Result<PathBuf> {
    which::which(program).with_context(|| format!("locate {program} executable"))
}

/// Processor that spawns the engine binary once per batch.
#[derive(Debug, Clone)]
pub struct EngineExecutor {
    program: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl EngineExecutor {
    pub fn new(
        program: impl Into<PathBuf>,
        timeout: Option<Duration>,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            program: program.into(),
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            &config.engine_path,
            config.settings.exec_timeout(),
            config.settings.output_limit_bytes,
        )
    }
}

impl CommandProcessor for EngineExecutor {
    #[instrument(skip_all, fields(queue_manager = %target, batch_bytes = batch.len()))]
    fn execute(&self, target: &str, batch: &str) -> Result<ExecutionOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(target);

        let output = run_with_input(
            cmd,
            batch.as_bytes(),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run {}", self.program.display()))?;

        if output.timed_out {
            warn!(program = %self.program.display(), "engine timed out");
        }
        let success = output.status.success() && !output.timed_out;
        debug!(exit_code = ?output.status.code(), success, "engine finished");

        Ok(ExecutionOutcome {
            output: String::from_utf8_lossy(&output.output).into_owned(),
            success,
            exit_code: output.status.code(),
            truncated_bytes: output.truncated,
            timed_out: output.timed_out,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::classifier::classify_output;
    use crate::core::types::Signal;
    use crate::test_support::FakeEngine;

    #[test]
    fn passes_target_and_streams_batch() {
        let engine = FakeEngine::new("echo \"qmgr=$1\"; cat").expect("engine");
        let executor = EngineExecutor::new(engine.path(), None, 10_000);

        let outcome = executor
            .execute("QM1", "DEFINE QLOCAL(APP.IN)\n")
            .expect("execute");

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.output, "qmgr=QM1\nDEFINE QLOCAL(APP.IN)\n");
    }

    #[test]
    fn nonzero_exit_returns_output_and_failure() {
        let engine = FakeEngine::new("cat >/dev/null; printf 'ERROR\\nBAD COMMAND\\n'; exit 1")
            .expect("engine");
        let executor = EngineExecutor::new(engine.path(), None, 10_000);

        let outcome = executor.execute("QM1", "GARBAGE\n").expect("execute");

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.output, "ERROR\nBAD COMMAND\n");
    }

    #[test]
    fn timeout_marks_outcome_failed() {
        let engine = FakeEngine::new("cat >/dev/null; sleep 5").expect("engine");
        let executor =
            EngineExecutor::new(engine.path(), Some(Duration::from_millis(100)), 10_000);

        let started = std::time::Instant::now();
        let outcome = executor.execute("QM1", "").expect("execute");

        assert!(outcome.timed_out);
        assert!(!outcome.success);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn long_output_keeps_closing_lines_for_classification() {
        let engine = FakeEngine::new(
            "cat >/dev/null; i=1; while [ $i -le 50 ]; do echo \"LINE $i\"; i=$((i+1)); done; \
             echo 'ALL VALID MQSC COMMANDS WERE PROCESSED.'",
        )
        .expect("engine");
        let executor = EngineExecutor::new(engine.path(), None, 64);

        let outcome = executor.execute("QM1", "DISPLAY QMGR\n").expect("execute");

        assert!(outcome.success);
        assert!(outcome.truncated_bytes > 0);
        assert_eq!(
            classify_output(&outcome.output),
            Signal::Success {
                signature: "line 49line 50all valid mqsc commands were processed.".to_string()
            }
        );
    }

    #[test]
    fn missing_engine_is_an_error() {
        let executor = EngineExecutor::new("/nonexistent/runmqsc", None, 10_000);
        assert!(executor.execute("QM1", "").is_err());
    }

    #[test]
    fn locate_engine_reports_missing_program() {
        let err = locate_engine("mqsync-no-such-engine-binary").unwrap_err();
        assert!(err.to_string().contains("mqsync-no-such-engine-binary"));
    }

    #[test]
    fn locate_engine_accepts_explicit_path() {
        let engine = FakeEngine::new("exit 0").expect("engine");
        let located = locate_engine(engine.path().to_str().expect("utf8")).expect("locate");
        assert!(located.ends_with("runmqsc"));
    }
}
