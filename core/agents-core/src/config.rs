//! Configuration loading.
//!
//! `<agents_home>/config.toml` is optional. Every field has a default, and a
//! malformed file falls back to defaults with a warning: configuration problems
//! must not stop an agent session from launching.
//!
//! ```toml
//! sessions_dir = "/home/me/.agents/sessions"
//! agent_bin = "/home/me/.claude/local/node_modules/.bin/claude"
//! system_prompt_file = "/home/me/.agents/system-prompt.md"
//! vcs_timeout_secs = 10
//! poll_interval_ms = 100
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AgentsError, Result};
use crate::storage::StorageConfig;

const DEFAULT_VCS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Raw file contents; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    sessions_dir: Option<PathBuf>,
    agent_bin: Option<PathBuf>,
    system_prompt_file: Option<PathBuf>,
    vcs_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
}

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    pub storage: StorageConfig,
    pub agent_bin: PathBuf,
    pub system_prompt_file: PathBuf,
    pub vcs_timeout: Duration,
    pub poll_interval: Duration,
}

impl AgentsConfig {
    /// Loads from `storage.config_file()`, degrading to defaults on any problem.
    pub fn load(storage: StorageConfig) -> Self {
        let path = storage.config_file();
        let file = match read_config_file(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Ignoring configuration file");
                ConfigFile::default()
            }
        };
        Self::from_file(storage, file)
    }

    /// Defaults only, no file read.
    pub fn defaults(storage: StorageConfig) -> Self {
        Self::from_file(storage, ConfigFile::default())
    }

    fn from_file(storage: StorageConfig, file: ConfigFile) -> Self {
        let storage = match file.sessions_dir {
            Some(dir) => storage.with_sessions_dir(dir),
            None => storage,
        };
        let agent_bin = file.agent_bin.unwrap_or_else(default_agent_bin);
        let system_prompt_file = file
            .system_prompt_file
            .unwrap_or_else(|| storage.root().join("system-prompt.md"));
        let vcs_timeout =
            Duration::from_secs(file.vcs_timeout_secs.unwrap_or(DEFAULT_VCS_TIMEOUT_SECS).max(1));
        let poll_interval = Duration::from_millis(
            file.poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .clamp(10, 1000),
        );

        Self {
            storage,
            agent_bin,
            system_prompt_file,
            vcs_timeout,
            poll_interval,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => return Err(AgentsError::io("read configuration", e)),
    };
    toml::from_str(&content).map_err(|e| AgentsError::Config {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

/// `~/.claude/local/node_modules/.bin/claude`, or `claude` on `$PATH` without a home.
fn default_agent_bin() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".claude/local/node_modules/.bin/claude"))
        .unwrap_or_else(|| PathBuf::from("claude"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = AgentsConfig::load(StorageConfig::with_root(temp.path().to_path_buf()));

        assert_eq!(config.vcs_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.storage.sessions_dir(), temp.path().join("sessions"));
        assert_eq!(
            config.system_prompt_file,
            temp.path().join("system-prompt.md")
        );
    }

    #[test]
    fn test_file_overrides() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(
            storage.config_file(),
            "sessions_dir = \"/srv/sessions\"\nagent_bin = \"/opt/agent\"\nvcs_timeout_secs = 3\npoll_interval_ms = 50\n",
        )
        .unwrap();

        let config = AgentsConfig::load(storage);
        assert_eq!(config.storage.sessions_dir(), Path::new("/srv/sessions"));
        assert_eq!(config.agent_bin, PathBuf::from("/opt/agent"));
        assert_eq!(config.vcs_timeout, Duration::from_secs(3));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "vcs_timeout_secs = \"soon\"").unwrap();

        let config = AgentsConfig::load(storage);
        assert_eq!(config.vcs_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "poll_interval_ms = 0").unwrap();
        assert_eq!(
            AgentsConfig::load(storage).poll_interval,
            Duration::from_millis(10)
        );
    }
}
