//! Error types for agents-core operations.
//!
//! Only conditions the caller must act on are errors. Missing sessions, corrupt
//! metadata, and failed version-control queries degrade to empty results instead.

use std::path::PathBuf;

/// All errors that can occur in agents-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentsError {
    // ─────────────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session registry unavailable at {path}: {source}")]
    RegistryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not allocate a unique session id after {attempts} attempts")]
    SessionIdExhausted { attempts: u32 },

    #[error("Invalid session id: {id:?}")]
    InvalidSessionId { id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },

    #[error("Home directory not found")]
    NoHomeDir,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using AgentsError.
pub type Result<T> = std::result::Result<T, AgentsError>;

impl AgentsError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AgentsError::Io {
            context: context.into(),
            source,
        }
    }
}
