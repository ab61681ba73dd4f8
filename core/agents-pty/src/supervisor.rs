//! Pseudo-terminal supervisor.
//!
//! One child per supervisor. The loop turns descriptor readiness, child exit
//! and signal flags into [`ProxyEvent`]s and handles them in order; nothing is
//! processed asynchronously.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::openpty;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{setsid, Pid};
use tracing::{debug, info, warn};

use crate::command::AgentCommand;
use crate::error::{PtyError, Result};
use crate::signals;
use crate::terminal::{self, ControllingTerminal};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;

/// How long a draining read waits for bytes still in flight through the pty.
const DRAIN_POLL_MS: u16 = 50;

/// How long a terminated child gets before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The child exited on its own. Killed-by-signal maps to `128 + signal`.
    Exited(i32),
    /// SIGTERM or SIGHUP reached the supervisor and the child was stopped.
    Terminated,
}

impl ExitReason {
    /// Status the launching process should exit with.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::Exited(code) => code,
            ExitReason::Terminated => 0,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ProxyEvent {
    OutputReady,
    InputReady,
    ChildExited(ExitStatus),
    ResizeRequested,
    TerminateRequested,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    poll_interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Supervisor {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Runs `command` against this process's own terminal and stdout.
    pub fn run(&self, command: &AgentCommand) -> Result<ExitReason> {
        let terminal = ControllingTerminal::from_stdin();
        let stdout = io::stdout();
        let mut output = stdout.lock();
        self.run_with(command, terminal.as_ref(), &mut output)
    }

    /// Runs `command` with an explicit terminal and output sink.
    ///
    /// Without a terminal the child still gets a pty, but no input is relayed
    /// and no attributes are touched.
    pub fn run_with<W: Write>(
        &self,
        command: &AgentCommand,
        terminal: Option<&ControllingTerminal>,
        output: &mut W,
    ) -> Result<ExitReason> {
        let saved = terminal.map(ControllingTerminal::attributes).transpose()?;
        let size = terminal.and_then(ControllingTerminal::window_size);

        let pty = openpty(size.as_ref(), saved.as_ref()).map_err(PtyError::OpenPty)?;
        terminal::set_cloexec(&pty.master)
            .map_err(|e| PtyError::io("configure pty master", e))?;
        terminal::set_cloexec(&pty.slave)
            .map_err(|e| PtyError::io("configure pty slave", e))?;
        let master = File::from(pty.master);

        // Handlers go in before the child exists, so a SIGTERM or SIGHUP that
        // lands mid-spawn is queued for the loop instead of killing the
        // launcher. Dropped in reverse: terminal restored first, then the
        // session (which reaps or kills the child), then the handlers.
        let _signals = signals::install()?;

        let child = spawn_child(command, pty.slave)?;
        info!(pid = child.id(), program = %command.display_program(), "Agent started");

        let mut session = ProxySession {
            master,
            child,
            reaped: false,
            terminal,
            output,
            master_open: true,
            input_open: terminal.is_some(),
            poll_timeout: poll_timeout(self.poll_interval),
        };

        let _raw = match (terminal, saved) {
            (Some(terminal), Some(saved)) => Some(terminal.enter_raw_mode(saved)?),
            _ => None,
        };

        let reason = session.run()?;
        debug!(?reason, "Supervisor finished");
        Ok(reason)
    }
}

fn poll_timeout(interval: Duration) -> PollTimeout {
    let millis = interval.as_millis().min(u128::from(u16::MAX)) as u16;
    PollTimeout::from(millis)
}

/// Starts the child as a session leader whose stdio and controlling terminal
/// are the pty slave. Consumes the slave so the parent's copy is closed once
/// the child is running.
fn spawn_child(command: &AgentCommand, slave: OwnedFd) -> Result<Child> {
    let slave = File::from(slave);
    let stdin = slave
        .try_clone()
        .map_err(|e| PtyError::io("duplicate pty slave", e))?;
    let stdout = slave
        .try_clone()
        .map_err(|e| PtyError::io("duplicate pty slave", e))?;

    let mut std_command = command.to_command();
    std_command
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(slave));

    // SAFETY: only async-signal-safe calls run between fork and exec. Stdio is
    // already on fds 0-2 when this runs.
    unsafe {
        std_command.pre_exec(|| {
            signals::reset_in_child()?;
            setsid()?;
            // Best effort: without a controlling terminal the child still runs.
            libc::ioctl(0, libc::TIOCSCTTY, 0);
            Ok(())
        });
    }

    std_command.spawn().map_err(|source| PtyError::Spawn {
        program: command.display_program(),
        source,
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

struct ProxySession<'a, W: Write> {
    master: File,
    child: Child,
    reaped: bool,
    terminal: Option<&'a ControllingTerminal>,
    output: &'a mut W,
    master_open: bool,
    input_open: bool,
    poll_timeout: PollTimeout,
}

impl<W: Write> ProxySession<'_, W> {
    fn run(&mut self) -> Result<ExitReason> {
        loop {
            for event in self.next_events()? {
                match event {
                    ProxyEvent::TerminateRequested => return Ok(self.terminate()),
                    ProxyEvent::ResizeRequested => self.resize(),
                    ProxyEvent::ChildExited(status) => {
                        self.reaped = true;
                        self.drain();
                        let code = exit_code(status);
                        info!(code, "Agent exited");
                        return Ok(ExitReason::Exited(code));
                    }
                    ProxyEvent::OutputReady => self.relay_output(),
                    ProxyEvent::InputReady => self.relay_input(),
                }
            }
        }
    }

    fn next_events(&mut self) -> Result<Vec<ProxyEvent>> {
        if signals::take_terminate() {
            return Ok(vec![ProxyEvent::TerminateRequested]);
        }

        let mut events = Vec::new();
        if signals::take_resize() {
            events.push(ProxyEvent::ResizeRequested);
        }

        let status = self
            .child
            .try_wait()
            .map_err(|e| PtyError::io("check agent status", e))?;
        if let Some(status) = status {
            events.push(ProxyEvent::ChildExited(status));
            return Ok(events);
        }

        events.extend(self.poll_ready());
        Ok(events)
    }

    /// Waits up to one poll interval for either side to become readable.
    fn poll_ready(&mut self) -> Vec<ProxyEvent> {
        let input = self.terminal.filter(|_| self.input_open);

        let mut fds = Vec::with_capacity(2);
        let master_slot = self.master_open.then(|| {
            fds.push(PollFd::new(self.master.as_fd(), PollFlags::POLLIN));
            fds.len() - 1
        });
        let input_slot = input.map(|terminal| {
            fds.push(PollFd::new(terminal.input().as_fd(), PollFlags::POLLIN));
            fds.len() - 1
        });

        match poll(&mut fds, self.poll_timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "poll failed, closing both directions");
                self.master_open = false;
                self.input_open = false;
                return Vec::new();
            }
        }

        let master_revents = master_slot.and_then(|i| fds[i].revents());
        let input_revents = input_slot.and_then(|i| fds[i].revents());
        drop(fds);

        let mut events = Vec::new();
        // Hang-up on the master still needs a read: it yields the last bytes or EIO.
        if master_revents.is_some_and(|r| !r.is_empty()) {
            events.push(ProxyEvent::OutputReady);
        }
        match input_revents {
            Some(r) if r.contains(PollFlags::POLLIN) => events.push(ProxyEvent::InputReady),
            Some(r) if !r.is_empty() => {
                debug!(revents = ?r, "Terminal input closed");
                self.input_open = false;
            }
            _ => {}
        }
        events
    }

    fn relay_output(&mut self) {
        let mut buf = [0u8; READ_CHUNK];
        match (&self.master).read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if let Err(e) = write_through(self.output, &buf[..n]) {
                    warn!(error = %e, "Output closed, no longer relaying agent output");
                    self.master_open = false;
                }
            }
            Err(e) if is_transient(&e) => {}
            Err(e) => {
                // EIO once every slave descriptor is gone.
                debug!(error = %e, "pty master closed");
                self.master_open = false;
            }
        }
    }

    fn relay_input(&mut self) {
        let Some(terminal) = self.terminal else {
            return;
        };
        let mut buf = [0u8; READ_CHUNK];
        match terminal.input().read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if let Err(e) = (&self.master).write_all(&buf[..n]) {
                    debug!(error = %e, "pty master rejected input");
                    self.input_open = false;
                }
            }
            Err(e) if is_transient(&e) => {}
            Err(e) => {
                debug!(error = %e, "Terminal input closed");
                self.input_open = false;
            }
        }
    }

    /// Copies whatever the child left in the pty after it exited.
    fn drain(&mut self) {
        if !self.master_open {
            return;
        }
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let mut fds = [PollFd::new(self.master.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(DRAIN_POLL_MS)) {
                Ok(0) => break,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(_) => break,
            }
            match (&self.master).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if write_through(self.output, &buf[..n]).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        self.master_open = false;
    }

    fn resize(&mut self) {
        let Some(size) = self.terminal.and_then(ControllingTerminal::window_size) else {
            return;
        };
        if let Err(e) = terminal::set_window_size(&self.master, &size) {
            debug!(error = %e, "Failed to resize pty");
            return;
        }
        debug!(rows = size.ws_row, cols = size.ws_col, "Forwarding window size");
        let _ = kill(self.child_pid(), Signal::SIGWINCH);
    }

    fn terminate(&mut self) -> ExitReason {
        info!("Termination requested, stopping agent");
        let _ = kill(self.child_pid(), Signal::SIGTERM);
        self.reap(TERMINATE_GRACE);
        ExitReason::Terminated
    }

    /// Waits for the child, escalating to SIGKILL after `grace`.
    fn reap(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() >= deadline => {
                    warn!("Agent ignored SIGTERM, killing it");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => {
                    warn!(error = %e, "Failed to wait for agent");
                    break;
                }
            }
        }
        self.reaped = true;
    }

    fn child_pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as libc::pid_t)
    }
}

impl<W: Write> Drop for ProxySession<'_, W> {
    fn drop(&mut self) {
        // Only reached unreaped on an error path.
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn write_through<W: Write>(output: &mut W, bytes: &[u8]) -> io::Result<()> {
    output.write_all(bytes)?;
    output.flush()
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_reason_codes() {
        assert_eq!(ExitReason::Exited(3).exit_code(), 3);
        assert_eq!(ExitReason::Terminated.exit_code(), 0);
    }

    #[test]
    fn test_signal_deaths_map_above_128() {
        let status = ExitStatus::from_raw(libc::SIGKILL);
        assert_eq!(exit_code(status), 128 + libc::SIGKILL);

        let status = ExitStatus::from_raw(2 << 8);
        assert_eq!(exit_code(status), 2);
    }

    #[test]
    fn test_poll_timeout_saturates() {
        assert_eq!(
            poll_timeout(Duration::from_secs(3600)),
            PollTimeout::from(u16::MAX)
        );
        assert_eq!(
            poll_timeout(Duration::from_millis(100)),
            PollTimeout::from(100u16)
        );
    }
}
