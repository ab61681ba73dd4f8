//! The "current session" as an explicit value.
//!
//! The launcher exports [`SESSION_ENV_VAR`] to the agent process; tooling the agent
//! spawns (hooks) inherits it. Libraries never read the environment themselves:
//! binaries build a [`SessionContext`] once and pass it down.

use std::env;

/// Environment variable carrying the current session id into child tooling.
pub const SESSION_ENV_VAR: &str = "AGENT_SESSION_ID";

/// Resolved "current session" for one process. `None` means tracking is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session_id: Option<String>,
}

impl SessionContext {
    /// Reads [`SESSION_ENV_VAR`]. Unset or blank means no active session.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves the session through an injected lookup instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let session_id = lookup(SESSION_ENV_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self { session_id }
    }

    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_tracking(&self) -> bool {
        self.session_id.is_some()
    }
}
