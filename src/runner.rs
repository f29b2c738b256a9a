//! Streams supervised runs to the terminal.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tfkit::{CancelHandle, InterruptGuard, OutputSink, ProcessHandle, Termination};

use crate::ui;

/// A streamed run that did not finish cleanly.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{command} exited with code {code}")]
    Failed { command: String, code: i32 },

    #[error("{command} was cancelled")]
    Cancelled { command: String },
}

impl RunError {
    /// Process exit code tfc should report for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Failed { code, .. } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            Self::Cancelled { .. } => 130,
        }
    }
}

/// Prints every output line with a gutter.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    lines: usize,
}

impl ConsoleSink {
    pub fn lines(&self) -> usize {
        self.lines
    }
}

impl OutputSink for ConsoleSink {
    fn on_line(&mut self, line: &str) {
        ui::output_line(line);
        self.lines += 1;
    }
}

/// Forward a running command's output to the terminal and report how it
/// ended. A watchdog cancels the run on Ctrl-C or once `timeout` elapses.
pub fn stream(label: &str, handle: ProcessHandle, timeout: Option<Duration>) -> Result<Termination> {
    let watchdog = Watchdog::start(handle.cancel_handle(), timeout);

    let mut sink = ConsoleSink::default();
    let result = handle.pipe_to(&mut sink);
    let fired = watchdog.disarm();

    let termination = result.with_context(|| format!("{label} failed"))?;
    log::debug!("{label}: {} lines, {termination}", sink.lines());

    match termination {
        Termination::Exited(0) => ui::success(&format!("{label} completed")),
        Termination::Exited(code) => ui::error(&format!("{label} exited with code {code}")),
        Termination::Cancelled => match fired {
            Some(reason) => ui::warn(&format!("{label} cancelled ({reason})")),
            None => ui::warn(&format!("{label} cancelled")),
        },
    }

    Ok(termination)
}

/// Turn a non-successful termination into an error
pub fn ensure_success(label: &str, termination: Termination) -> Result<()> {
    match termination {
        Termination::Exited(0) => Ok(()),
        Termination::Exited(code) => Err(RunError::Failed {
            command: label.to_string(),
            code,
        }
        .into()),
        Termination::Cancelled => Err(RunError::Cancelled {
            command: label.to_string(),
        }
        .into()),
    }
}

// ============================================================================
// Watchdog
// ============================================================================

/// Why the watchdog cancelled a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    TimedOut,
    Interrupted,
}

impl std::fmt::Display for Fired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Cancels a run on Ctrl-C or when it outlives its timeout.
///
/// The child runs in its own process group, so the terminal's SIGINT only
/// reaches tfc; the watchdog turns it into a cancellation.
pub struct Watchdog {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<Option<Fired>>>,
}

impl Watchdog {
    pub fn start(cancel: CancelHandle, timeout: Option<Duration>) -> Self {
        let (stop, rx) = mpsc::channel::<()>();
        let interrupts = InterruptGuard::install();
        let deadline = timeout.map(|t| Instant::now() + t);

        let thread = thread::spawn(move || {
            loop {
                match rx.recv_timeout(WATCH_INTERVAL) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return None,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let fired = if interrupts.take() {
                    Fired::Interrupted
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    Fired::TimedOut
                } else {
                    continue;
                };
                log::info!("run {fired}, cancelling");
                cancel.cancel();
                return Some(fired);
            }
        });

        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    /// Stop watching. Returns why the watchdog fired, if it did.
    pub fn disarm(mut self) -> Option<Fired> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Fired> {
        drop(self.stop.take());
        self.thread
            .take()
            .and_then(|t| t.join().unwrap_or(None))
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
