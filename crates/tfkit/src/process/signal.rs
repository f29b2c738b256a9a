//! Platform glue for terminating children and decoding exit statuses.
//!
//! On Unix every streamed child leads its own process group, so signals go
//! to the whole group and reach whatever the child started (provider
//! plugins, shells' background jobs).

use std::io;
use std::process::{Child, Command, ExitStatus};

/// Put the command in a new process group led by the child.
#[cfg(unix)]
pub(crate) fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate(_command: &mut Command) {}

/// Ask the child's process group to exit.
///
/// On Unix this sends SIGTERM so the tool can release locks and write its
/// state. Elsewhere there is no polite signal, so the child is killed.
#[cfg(unix)]
pub(crate) fn terminate(child: &mut Child) -> io::Result<()> {
    signal_group(child, libc::SIGTERM)
}

#[cfg(not(unix))]
pub(crate) fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// SIGKILL the child's process group.
#[cfg(unix)]
pub(crate) fn kill(child: &mut Child) -> io::Result<()> {
    match signal_group(child, libc::SIGKILL) {
        Ok(()) => Ok(()),
        // The group is already gone; make sure the leader is too.
        Err(_) => child.kill(),
    }
}

#[cfg(not(unix))]
pub(crate) fn kill(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::other("pid out of range"))?;

    // SAFETY: the caller holds the group leader unreaped, so the pgid still
    // names the group we created and cannot have been recycled.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Integer exit code for a finished process.
///
/// Death by signal is reported as `128 + signal`, matching shells.
#[cfg(unix)]
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

// ============================================================================
// Interrupts
// ============================================================================

#[cfg(unix)]
mod interrupt {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);
    static INSTALLED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn on_sigint(_: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub(super) fn install() {
        if INSTALLED.fetch_add(1, Ordering::SeqCst) == 0 {
            INTERRUPTED.store(false, Ordering::SeqCst);
            let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
            // SAFETY: the handler only stores to an atomic, which is
            // async-signal-safe.
            unsafe { libc::signal(libc::SIGINT, handler) };
        }
    }

    pub(super) fn uninstall() {
        if INSTALLED.fetch_sub(1, Ordering::SeqCst) == 1 {
            // SAFETY: restores the default disposition.
            unsafe { libc::signal(libc::SIGINT, libc::SIG_DFL) };
        }
    }

    pub(super) fn take() -> bool {
        INTERRUPTED.swap(false, Ordering::SeqCst)
    }
}

/// Catches Ctrl-C while a child runs in its own process group.
///
/// The terminal only interrupts the foreground group, which no longer
/// contains the child. While a guard is alive SIGINT sets a flag instead of
/// killing this process; the owner polls [`InterruptGuard::take`] and
/// cancels the run. Dropping the last guard restores the default handler.
#[derive(Debug)]
pub struct InterruptGuard {
    _private: (),
}

impl InterruptGuard {
    /// Start catching SIGINT.
    pub fn install() -> Self {
        #[cfg(unix)]
        interrupt::install();
        Self { _private: () }
    }

    /// Whether Ctrl-C was pressed since the last call.
    pub fn take(&self) -> bool {
        #[cfg(unix)]
        let interrupted = interrupt::take();
        #[cfg(not(unix))]
        let interrupted = false;
        interrupted
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        interrupt::uninstall();
    }
}
