//! Storage configuration and path management.
//!
//! Every on-disk location used by the workspace is derived here, so tests can
//! inject a temp root with [`StorageConfig::with_root`] and production code
//! resolves `~/.agents` (or `$AGENTS_HOME`) once at the binary boundary.
//!
//! ## Layout
//!
//! ```text
//! ~/.agents/
//! ├── config.toml
//! ├── logs/
//! └── sessions/
//!     └── {session_id}/
//!         ├── meta.json    # { session_id, started, pid, cwd }
//!         └── files.txt    # one absolute path per line
//! ```

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::{AgentsError, Result};

/// Environment variable overriding the agents home directory.
pub const AGENTS_HOME_ENV: &str = "AGENTS_HOME";

const META_FILE: &str = "meta.json";
const FILES_LOG: &str = "files.txt";

/// Central configuration for all storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all data (default: ~/.agents)
    root: PathBuf,
    /// Directory holding one subdirectory per session (default: {root}/sessions)
    sessions_dir: PathBuf,
}

impl StorageConfig {
    /// Resolves the root from `$AGENTS_HOME`, falling back to `~/.agents`.
    pub fn resolve() -> Result<Self> {
        if let Some(root) = env::var_os(AGENTS_HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(AgentsError::NoHomeDir)?;
        Ok(Self::with_root(home.join(".agents")))
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        let sessions_dir = root.join("sessions");
        Self { root, sessions_dir }
    }

    /// Replaces the sessions directory, keeping the root.
    pub fn with_sessions_dir(mut self, sessions_dir: PathBuf) -> Self {
        self.sessions_dir = sessions_dir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Path to a session's directory. Callers check the id with
    /// [`is_valid_session_id`] first; an invalid id would escape `sessions_dir`.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    /// Path to a session's metadata record.
    pub fn meta_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join(META_FILE)
    }

    /// Path to a session's touched-file log.
    pub fn files_log(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join(FILES_LOG)
    }
}

/// True when `session_id` names exactly one directory entry: no separators,
/// no `.` or `..`, not empty.
pub fn is_valid_session_id(session_id: &str) -> bool {
    let mut components = Path::new(session_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == session_id
    )
}
