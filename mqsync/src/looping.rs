//! Fixed-interval poll loop for `mqsync run`.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::types::CycleReport;
use crate::cycle::run_cycle;
use crate::io::config::SyncConfig;
use crate::io::executor::CommandProcessor;
use crate::io::source::RemoteSource;

/// Blocks the loop between cycles. Tests substitute a recording implementation.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Summary of a loop invocation that stopped at its cycle cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles_run: u64,
}

/// Run cycles separated by `config.poll_interval`.
///
/// Each cycle runs to completion before the sleep starts, and the sleep is the
/// same regardless of what the cycle reported. With `max_cycles = None` this
/// never returns; with a cap it returns right after the last cycle, without
/// sleeping.
pub fn run_loop<S, P, Z, F>(
    config: &SyncConfig,
    source: &S,
    processor: &P,
    sleeper: &Z,
    max_cycles: Option<u64>,
    mut on_cycle: F,
) -> LoopOutcome
where
    S: RemoteSource,
    P: CommandProcessor,
    Z: Sleeper,
    F: FnMut(&CycleReport),
{
    let mut cycles_run = 0u64;
    loop {
        let report = run_cycle(config, source, processor);
        cycles_run += 1;
        on_cycle(&report);

        if max_cycles.is_some_and(|max| cycles_run >= max) {
            info!(cycles_run, "cycle limit reached");
            return LoopOutcome { cycles_run };
        }

        debug!(
            interval_ms = config.poll_interval.as_millis() as u64,
            "sleeping until next cycle"
        );
        sleeper.sleep(config.poll_interval);
    }
}
