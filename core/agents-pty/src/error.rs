//! Errors surfaced by the supervisor.
//!
//! Only setup failures propagate. Once the child is running, descriptor errors
//! close the affected direction instead of failing the session.

use nix::errno::Errno;

#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("Failed to open pseudo-terminal: {0}")]
    OpenPty(#[source] Errno),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Terminal error: {context}: {source}")]
    Terminal {
        context: &'static str,
        #[source]
        source: Errno,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PtyError>;

impl PtyError {
    pub(crate) fn terminal(context: &'static str, source: Errno) -> Self {
        PtyError::Terminal { context, source }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        PtyError::Io { context, source }
    }
}
