//! Helpers for feeding a child process on stdin while capturing its combined output.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long to keep reading pipes after a timed run has ended.
///
/// Processes the engine started may still hold stdout, stderr or stdin open;
/// once this elapses the pipe threads are abandoned.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured child process output.
#[derive(Debug)]
pub struct CombinedOutput {
    pub status: ExitStatus,
    /// Tail of stdout and stderr, interleaved in the order chunks were read.
    pub output: Vec<u8>,
    /// Leading bytes dropped to stay within the output limit.
    pub truncated: usize,
    pub timed_out: bool,
}

/// Run a command, writing `input` to its stdin while draining stdout and stderr.
///
/// The writer and both readers run on their own threads, so the child can emit
/// output (or stop reading) before the whole input is consumed without
/// deadlocking on full pipes. Only the last `output_limit_bytes` of output are
/// kept; earlier bytes are drained and counted in `truncated`.
///
/// With `timeout = None` the call waits for the child and for pipe EOF
/// indefinitely. With a timeout the child is killed once it expires, and the
/// pipes are read for at most [`PIPE_DRAIN_GRACE`] after the child is gone.
#[instrument(skip_all, fields(input_bytes = input.len(), timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes = output_limit_bytes))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CombinedOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
    let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
        kill_quietly(&mut child);
        return Err(anyhow!("child stdio was not piped"));
    };

    let tail = Arc::new(Mutex::new(TailBuffer::new(output_limit_bytes)));
    let (done_tx, done_rx) = mpsc::channel();

    let input = input.to_vec();
    let writer_tx = done_tx.clone();
    thread::spawn(move || {
        let _ = writer_tx.send(PipeDone::Stdin(write_input(stdin, &input)));
    });
    let stdout_tail = Arc::clone(&tail);
    let stdout_tx = done_tx.clone();
    thread::spawn(move || forward_output(stdout, &stdout_tail, &stdout_tx));
    let stderr_tail = Arc::clone(&tail);
    thread::spawn(move || forward_output(stderr, &stderr_tail, &done_tx));

    let (status, timed_out) = match wait_for_exit(&mut child, timeout) {
        Ok(exit) => exit,
        Err(e) => {
            kill_quietly(&mut child);
            return Err(e);
        }
    };

    let drain_deadline = timeout.map(|_| Instant::now() + PIPE_DRAIN_GRACE);
    await_pipes(&done_rx, drain_deadline)?;

    let (output, truncated) = tail
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .snapshot();
    if truncated > 0 {
        warn!(truncated, kept = output.len(), "dropped leading output beyond limit");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CombinedOutput {
        status,
        output,
        truncated,
        timed_out,
    })
}

/// Completion message from one of the three pipe threads.
enum PipeDone {
    Stdin(io::Result<()>),
    Output(Result<()>),
}

fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(limit) = timeout else {
        return Ok((child.wait().context("wait for command")?, false));
    };
    if let Some(status) = child.wait_timeout(limit).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(err = %e, "kill after failure");
    }
    let _ = child.wait();
}

/// Wait for all three pipe threads, or until `deadline` if one is given.
fn await_pipes(done_rx: &Receiver<PipeDone>, deadline: Option<Instant>) -> Result<()> {
    for _ in 0..3 {
        let done = match deadline {
            None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => {
                done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
        };
        match done {
            Ok(PipeDone::Stdin(Ok(()))) => {}
            Ok(PipeDone::Stdin(Err(e))) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("child closed stdin before all input was written");
            }
            Ok(PipeDone::Stdin(Err(e))) => warn!(err = %e, "failed to write command input"),
            Ok(PipeDone::Output(result)) => result?,
            Err(RecvTimeoutError::Timeout) => {
                warn!("child pipes still open after exit, abandoning pipe threads");
                return Ok(());
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("pipe thread panicked"));
            }
        }
    }
    Ok(())
}

/// Write all input, then close stdin by dropping it.
fn write_input(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    stdin.write_all(input)?;
    stdin.flush()
}

fn forward_output<R: Read>(reader: R, tail: &Mutex<TailBuffer>, done: &Sender<PipeDone>) {
    let result = read_into(reader, tail);
    let _ = done.send(PipeDone::Output(result));
}

fn read_into<R: Read>(mut reader: R, tail: &Mutex<TailBuffer>) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read output"),
        };
        tail.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(&chunk[..n]);
    }
}

/// Keeps the last `limit` bytes pushed into it.
#[derive(Debug)]
struct TailBuffer {
    buf: VecDeque<u8>,
    limit: usize,
    dropped: usize,
}

impl TailBuffer {
    fn new(limit: usize) -> Self {
        Self {
            buf: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.dropped += self.buf.len() + chunk.len() - self.limit;
            self.buf.clear();
            self.buf.extend(&chunk[chunk.len() - self.limit..]);
            return;
        }
        let overflow = (self.buf.len() + chunk.len()).saturating_sub(self.limit);
        self.buf.drain(..overflow);
        self.dropped += overflow;
        self.buf.extend(chunk);
    }

    fn snapshot(&self) -> (Vec<u8>, usize) {
        (self.buf.iter().copied().collect(), self.dropped)
    }
}
