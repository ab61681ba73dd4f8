//! The real terminal the user is sitting at, plus the window-size and
//! descriptor helpers shared with the pty master.

use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, AsRawFd};

use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};

use crate::error::{PtyError, Result};

pub type WindowSize = libc::winsize;

/// A terminal device we can read keystrokes from and reconfigure.
///
/// Holds its own duplicate of the descriptor, so dropping it never closes the
/// process's stdin.
#[derive(Debug)]
pub struct ControllingTerminal {
    file: File,
}

impl ControllingTerminal {
    /// The terminal attached to stdin, if stdin is a terminal at all.
    pub fn from_stdin() -> Option<Self> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return None;
        }
        let fd = stdin.as_fd().try_clone_to_owned().ok()?;
        Some(Self {
            file: File::from(fd),
        })
    }

    /// Wraps an already-open terminal device. Returns `None` for non-terminals.
    pub fn from_file(file: File) -> Option<Self> {
        file.is_terminal().then_some(Self { file })
    }

    pub fn attributes(&self) -> Result<Termios> {
        tcgetattr(&self.file).map_err(|e| PtyError::terminal("read terminal attributes", e))
    }

    pub fn window_size(&self) -> Option<WindowSize> {
        window_size(&self.file)
    }

    /// Switches to raw mode. The returned guard puts `saved` back when dropped.
    pub fn enter_raw_mode(&self, saved: Termios) -> Result<RawModeGuard<'_>> {
        let mut raw = saved.clone();
        cfmakeraw(&mut raw);
        tcsetattr(&self.file, SetArg::TCSAFLUSH, &raw)
            .map_err(|e| PtyError::terminal("enter raw mode", e))?;
        Ok(RawModeGuard {
            terminal: self,
            saved,
        })
    }

    pub(crate) fn input(&self) -> &File {
        &self.file
    }
}

/// Restores the terminal's original attributes on drop.
#[must_use]
pub struct RawModeGuard<'t> {
    terminal: &'t ControllingTerminal,
    saved: Termios,
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(&self.terminal.file, SetArg::TCSADRAIN, &self.saved) {
            tracing::warn!(error = %e, "Failed to restore terminal attributes");
        }
    }
}

pub(crate) fn window_size(fd: &impl AsRawFd) -> Option<WindowSize> {
    let mut size = WindowSize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ writes one winsize into the pointer we pass.
    let rc = unsafe {
        libc::ioctl(
            fd.as_raw_fd(),
            libc::TIOCGWINSZ,
            &mut size as *mut WindowSize,
        )
    };
    (rc == 0).then_some(size)
}

pub(crate) fn set_window_size(fd: &impl AsRawFd, size: &WindowSize) -> io::Result<()> {
    // SAFETY: TIOCSWINSZ only reads the winsize we pass.
    let rc = unsafe {
        libc::ioctl(
            fd.as_raw_fd(),
            libc::TIOCSWINSZ,
            size as *const WindowSize,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Keeps a descriptor from leaking into the child across exec.
pub(crate) fn set_cloexec(fd: &impl AsRawFd) -> io::Result<()> {
    // SAFETY: plain fcntl on a descriptor we own.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
