//! Process liveness probing for stale-session cleanup.
//!
//! Cleanup is destructive, so the probe answers in three states. Only a
//! definitive "no such process" is [`Liveness::Dead`]. A process we are not
//! allowed to signal still exists and is [`Liveness::Alive`]. Anything else the
//! OS reports is [`Liveness::Unknown`] and must never trigger removal.

/// Result of probing a pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
    Unknown,
}

impl Liveness {
    /// True only when removal is safe.
    pub fn is_dead(self) -> bool {
        self == Liveness::Dead
    }
}

/// Capability to check whether a pid refers to a running process.
pub trait ProcessProbe: Send + Sync {
    fn probe(&self, pid: u32) -> Liveness;
}

/// Probes with `kill(pid, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalZeroProbe;

impl ProcessProbe for SignalZeroProbe {
    fn probe(&self, pid: u32) -> Liveness {
        // kill(0, ..) and negative pids address process groups, not a single process.
        let Ok(raw_pid) = i32::try_from(pid) else {
            return Liveness::Unknown;
        };
        if raw_pid <= 0 {
            return Liveness::Unknown;
        }
        probe_raw(raw_pid)
    }
}

#[cfg(unix)]
fn probe_raw(pid: i32) -> Liveness {
    // SAFETY: signal 0 performs permission and existence checks only; nothing is delivered.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return Liveness::Alive;
    }
    classify_errno(std::io::Error::last_os_error().raw_os_error())
}

#[cfg(not(unix))]
fn probe_raw(_pid: i32) -> Liveness {
    Liveness::Unknown
}

#[cfg(unix)]
fn classify_errno(errno: Option<i32>) -> Liveness {
    match errno {
        Some(libc::ESRCH) => Liveness::Dead,
        Some(libc::EPERM) => Liveness::Alive,
        _ => Liveness::Unknown,
    }
}
