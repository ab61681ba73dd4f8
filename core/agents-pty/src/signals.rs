//! Signal handling for the supervisor.
//!
//! Handlers only flip atomic flags; the event loop polls and clears them. The
//! flags are process-global, so only one supervisor should run at a time.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::{PtyError, Result};

static RESIZE_REQUESTED: AtomicBool = AtomicBool::new(false);
static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(signal: libc::c_int) {
    match signal {
        libc::SIGWINCH => RESIZE_REQUESTED.store(true, Ordering::SeqCst),
        libc::SIGTERM | libc::SIGHUP => TERMINATE_REQUESTED.store(true, Ordering::SeqCst),
        _ => {}
    }
}

/// Previous dispositions, put back on drop.
#[must_use]
pub struct SignalGuard {
    previous: Vec<(Signal, SigAction)>,
}

/// Installs the supervisor's handlers and clears any stale requests.
///
/// SIGWINCH requests a resize, SIGTERM and SIGHUP request termination. SIGINT
/// is ignored: in raw mode Ctrl-C reaches the child as a byte instead.
///
/// Install before spawning the child, so a SIGTERM that arrives mid-spawn is
/// seen by the event loop. The child undoes this with [`reset_in_child`].
pub fn install() -> Result<SignalGuard> {
    RESIZE_REQUESTED.store(false, Ordering::SeqCst);
    TERMINATE_REQUESTED.store(false, Ordering::SeqCst);

    let handler = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());

    let mut guard = SignalGuard {
        previous: Vec::with_capacity(4),
    };
    for (signal, action) in [
        (Signal::SIGWINCH, &handler),
        (Signal::SIGTERM, &handler),
        (Signal::SIGHUP, &handler),
        (Signal::SIGINT, &ignore),
    ] {
        // SAFETY: the handler only stores to atomics.
        let previous = unsafe { sigaction(signal, action) }
            .map_err(|e| PtyError::terminal("install signal handler", e))?;
        guard.previous.push((signal, previous));
    }
    Ok(guard)
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (signal, action) in self.previous.drain(..).rev() {
            // SAFETY: reinstalling a disposition that was in place before.
            if let Err(e) = unsafe { sigaction(signal, &action) } {
                tracing::debug!(?signal, error = %e, "Failed to restore signal disposition");
            }
        }
    }
}

/// Restores default dispositions for every signal [`install`] touches.
///
/// Meant for the window between fork and exec: exec resets caught signals on
/// its own, but an ignored SIGINT would survive into the child. Only calls
/// `sigaction`, which is async-signal-safe.
pub(crate) fn reset_in_child() -> io::Result<()> {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in [
        Signal::SIGWINCH,
        Signal::SIGTERM,
        Signal::SIGHUP,
        Signal::SIGINT,
    ] {
        // SAFETY: installing the default disposition.
        unsafe { sigaction(signal, &default) }.map_err(io::Error::from)?;
    }
    Ok(())
}

/// True once per window-size change.
pub fn take_resize() -> bool {
    RESIZE_REQUESTED.swap(false, Ordering::SeqCst)
}

pub fn take_terminate() -> bool {
    TERMINATE_REQUESTED.swap(false, Ordering::SeqCst)
}

/// Asks a running supervisor to stop, as SIGTERM would.
pub fn request_terminate() {
    TERMINATE_REQUESTED.store(true, Ordering::SeqCst);
}
