//! Supervised, line-streaming subprocess execution.
//!
//! [`ProcessRunner::spawn`] starts one child per [`CommandInvocation`] and
//! returns a [`ProcessHandle`] that owns it. The handle yields the child's
//! stdout and stderr, merged, as trimmed text lines while the child is still
//! running, and then reports a [`Termination`].
//!
//! Two pump threads (one per pipe) read lines and forward them over a single
//! channel. The consumer iterates that channel, so it observes each line as
//! soon as the child writes it. Exit is awaited by polling the child under a
//! mutex, which lets a [`CancelHandle`] on another thread signal the child
//! without racing the reaper.
//!
//! ## Cancellation
//!
//! Each spawned child leads its own process group.
//! [`CancelHandle::cancel`] sends SIGTERM to that group and wakes a consumer
//! blocked on the next line. [`ProcessHandle::wait`] then gives the group the
//! runner's grace period to exit before killing it, and reports
//! [`Termination::Cancelled`]. Anything the child started goes down with it,
//! so no grandchild is left holding the output pipes.
//!
//! Because the child is outside the terminal's foreground group, Ctrl-C no
//! longer reaches it directly. Hold an [`InterruptGuard`] while streaming and
//! cancel when it reports an interrupt.
//!
//! ## Example
//!
//! ```no_run
//! use tfkit::process::{CommandInvocation, ProcessRunner};
//!
//! let runner = ProcessRunner::new();
//! let inv = CommandInvocation::new("terraform", ".").arg("init");
//! let mut handle = runner.spawn(&inv)?;
//! for line in handle.lines() {
//!     println!("{}", line?);
//! }
//! let termination = handle.wait()?;
//! println!("{termination}");
//! # Ok::<(), tfkit::Error>(())
//! ```

mod invocation;
mod signal;

pub use invocation::CommandInvocation;
pub use signal::InterruptGuard;

use crate::error::{Error, Result};
use log::{debug, trace};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Time a cancelled child gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Terminal status of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process ended on its own with this code (`128 + signal` when it
    /// was killed by a signal)
    Exited(i32),
    /// The caller requested termination before the process finished
    Cancelled,
}

impl Termination {
    /// Exit code, if the process was not cancelled.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Cancelled => None,
        }
    }

    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {code}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Receiver of a process's output lines and final status.
pub trait OutputSink {
    /// Called once per output line, in arrival order.
    fn on_line(&mut self, line: &str);

    /// Called once after the output is exhausted and the process reaped.
    fn on_exit(&mut self, _termination: Termination) {}
}

impl OutputSink for Vec<String> {
    fn on_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Output of a process run to completion with separate streams.
#[derive(Debug, Clone)]
pub struct Captured {
    /// Raw stdout bytes
    pub stdout: Vec<u8>,
    /// Stderr, lossily decoded
    pub stderr: String,
    /// How the process ended
    pub termination: Termination,
}

impl Captured {
    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.termination.success()
    }

    /// Get stdout as a string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// Spawns supervised child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace_period: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ProcessRunner {
    /// Create a runner with the default grace period.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long a cancelled child may take to exit before it is killed.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Time between SIGTERM and SIGKILL on cancellation.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Start the invocation and return a handle that streams its output.
    ///
    /// Fails without creating a process when the working directory is
    /// invalid, the stdin source cannot be opened, or the program cannot be
    /// found.
    pub fn spawn(&self, invocation: &CommandInvocation) -> Result<ProcessHandle> {
        let mut command = build_command(invocation)?;
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        signal::isolate(&mut command);

        let mut child = command
            .spawn()
            .map_err(|source| spawn_error(invocation, source))?;
        let pid = child.id();
        debug!("spawned `{}` (pid {pid})", invocation.command_line());

        let (tx, events) = mpsc::channel();
        let pipes = [
            child.stdout.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
            child.stderr.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
        ];

        let mut open_pipes = 0;
        for (name, pipe) in ["stdout", "stderr"].into_iter().zip(pipes) {
            let Some(pipe) = pipe else { continue };
            if let Err(source) = start_pump(pipe, invocation.program(), name, tx.clone()) {
                let _ = signal::kill(&mut child);
                let _ = child.wait();
                return Err(Error::SpawnFailed {
                    program: invocation.program().to_string(),
                    source,
                });
            }
            open_pipes += 1;
        }

        Ok(ProcessHandle {
            program: invocation.program().to_string(),
            pid,
            events,
            open_pipes,
            exhausted: open_pipes == 0,
            reaped: false,
            grace_period: self.grace_period,
            shared: Arc::new(Shared {
                child: Mutex::new(child),
                cancelled: AtomicBool::new(false),
                wake: tx,
            }),
        })
    }

    /// Spawn the invocation and forward everything to `sink`.
    pub fn run(
        &self,
        invocation: &CommandInvocation,
        sink: &mut dyn OutputSink,
    ) -> Result<Termination> {
        self.spawn(invocation)?.pipe_to(sink)
    }

    /// Run the invocation to completion, keeping stdout and stderr apart.
    ///
    /// Used for machine-readable output that must not be interleaved with
    /// diagnostics.
    pub fn capture(&self, invocation: &CommandInvocation) -> Result<Captured> {
        let mut command = build_command(invocation)?;
        let output = command
            .output()
            .map_err(|source| spawn_error(invocation, source))?;

        Ok(Captured {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            termination: Termination::Exited(signal::exit_code(output.status)),
        })
    }
}

/// Owner of one running child process.
///
/// Dropping a handle whose process has not been waited for kills and reaps
/// the child.
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    pid: u32,
    events: Receiver<Event>,
    open_pipes: usize,
    exhausted: bool,
    reaped: bool,
    grace_period: Duration,
    shared: Arc<Shared>,
}

impl ProcessHandle {
    /// OS process id of the child, which is also its process group id on
    /// Unix.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program name from the invocation.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// A cloneable handle that can cancel this process from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request termination. Equivalent to `cancel_handle().cancel()`.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// The output lines, merged from stdout and stderr.
    ///
    /// The sequence is single-pass: lines handed out are gone, and once it
    /// has ended (output closed, stream failure, or cancellation) it keeps
    /// returning `None`.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { handle: self }
    }

    /// Wait for the process to finish and reap it.
    ///
    /// Output the caller did not consume is drained first, so the status is
    /// only available after the output has ended.
    pub fn wait(mut self) -> Result<Termination> {
        self.drain();
        self.reap()
    }

    /// Forward every line to `sink`, then wait and report the termination.
    ///
    /// On a stream failure the child is still waited for before the error is
    /// returned.
    pub fn pipe_to(mut self, sink: &mut dyn OutputSink) -> Result<Termination> {
        let mut failure = None;
        for line in self.lines() {
            match line {
                Ok(line) => sink.on_line(&line),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let termination = self.wait()?;
        if let Some(err) = failure {
            return Err(err);
        }
        sink.on_exit(termination);
        Ok(termination)
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        while !self.exhausted {
            if self.is_cancelled() {
                self.exhausted = true;
                break;
            }
            let Ok(event) = self.events.recv() else {
                self.exhausted = true;
                break;
            };
            match event {
                Event::Line(line) => return Some(Ok(line)),
                Event::Failed(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
                Event::Closed => {
                    self.open_pipes -= 1;
                    self.exhausted = self.open_pipes == 0;
                }
                Event::Cancelled => {}
            }
        }
        None
    }

    fn drain(&mut self) {
        while self.open_pipes > 0 && !self.is_cancelled() {
            match self.events.recv() {
                Ok(Event::Closed) => self.open_pipes -= 1,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        self.exhausted = true;
    }

    fn reap(&mut self) -> Result<Termination> {
        let shared = Arc::clone(&self.shared);
        let mut deadline = None;

        loop {
            let mut child = lock(&shared.child);
            if let Some(status) = child.try_wait()? {
                self.reaped = true;
                trace!("{} (pid {}) exited: {status}", self.program, self.pid);
                if self.is_cancelled() {
                    return Ok(Termination::Cancelled);
                }
                return Ok(Termination::Exited(signal::exit_code(status)));
            }

            if self.is_cancelled() {
                let deadline = *deadline.get_or_insert_with(|| Instant::now() + self.grace_period);
                if Instant::now() >= deadline {
                    debug!(
                        "{} (pid {}) ignored termination, killing",
                        self.program, self.pid
                    );
                    signal::kill(&mut child)?;
                    child.wait()?;
                    self.reaped = true;
                    return Ok(Termination::Cancelled);
                }
            }

            drop(child);
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        self.shared.cancelled.store(true, Ordering::SeqCst);

        let mut child = lock(&self.shared.child);
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        debug!("killing unwaited {} (pid {})", self.program, self.pid);
        let _ = signal::kill(&mut child);
        let _ = child.wait();
    }
}

/// Iterator over a process's output lines. See [`ProcessHandle::lines`].
#[derive(Debug)]
pub struct Lines<'a> {
    handle: &'a mut ProcessHandle,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.handle.next_line()
    }
}

impl std::iter::FusedIterator for Lines<'_> {}

/// Requests early termination of a running process.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Signal the child to terminate and stop its line sequence.
    ///
    /// Idempotent. A process that has already exited is left alone and
    /// keeps its real exit status.
    pub fn cancel(&self) {
        {
            let mut child = lock(&self.shared.child);
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            if self.shared.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
            match signal::terminate(&mut child) {
                Ok(()) => debug!("sent termination to pid {}", child.id()),
                Err(err) => debug!("could not signal pid {}: {err}", child.id()),
            }
        }

        let _ = self.shared.wake.send(Event::Cancelled);
    }

    /// Whether cancellation was requested while the process was running.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Shared {
    child: Mutex<Child>,
    cancelled: AtomicBool,
    wake: Sender<Event>,
}

#[derive(Debug)]
enum Event {
    Line(String),
    Failed(Error),
    Closed,
    Cancelled,
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_command(invocation: &CommandInvocation) -> Result<Command> {
    let dir = invocation.working_dir();
    if !dir.is_dir() {
        return Err(Error::InvalidWorkingDirectory(dir.to_path_buf()));
    }

    // Relative stdin sources resolve against the working directory, like a
    // shell redirect run from there.
    let stdin = match invocation.stdin() {
        Some(path) => {
            let path = dir.join(path);
            let file = File::open(&path).map_err(|source| Error::InputUnavailable {
                path: path.clone(),
                source,
            })?;
            Stdio::from(file)
        }
        None => Stdio::null(),
    };

    let mut command = Command::new(invocation.program());
    command
        .args(invocation.arguments())
        .current_dir(dir)
        .stdin(stdin);
    Ok(command)
}

fn spawn_error(invocation: &CommandInvocation, source: io::Error) -> Error {
    let program = invocation.program().to_string();
    if source.kind() == io::ErrorKind::NotFound {
        Error::ExecutableNotFound { program }
    } else {
        Error::SpawnFailed { program, source }
    }
}

fn start_pump(
    pipe: Box<dyn Read + Send>,
    program: &str,
    name: &str,
    tx: Sender<Event>,
) -> io::Result<()> {
    let program = program.to_string();
    thread::Builder::new()
        .name(format!("tfkit-{name}"))
        .spawn(move || pump(pipe, &program, &tx))?;
    Ok(())
}

fn pump(pipe: impl Read, program: &str, tx: &Sender<Event>) {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(text) => {
                    if tx.send(Event::Line(text.trim().to_string())).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Event::Failed(Error::Stream {
                        program: program.to_string(),
                        message: err.to_string(),
                    }));
                    // Keep the pipe empty so the child never blocks on write.
                    let _ = io::copy(&mut reader, &mut io::sink());
                    break;
                }
            },
            Err(err) => {
                let _ = tx.send(Event::Failed(Error::Stream {
                    program: program.to_string(),
                    message: err.to_string(),
                }));
                break;
            }
        }
    }

    let _ = tx.send(Event::Closed);
}
