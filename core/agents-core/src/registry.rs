//! Durable registry of agent sessions.
//!
//! A session is registered by the launcher before the agent process starts and
//! stays on disk until [`SessionRegistry::cleanup_stale`] finds its owning pid gone.
//! There is no heartbeat: liveness is probed on demand.
//!
//! Readers (`get`, `list`) run concurrently with other processes creating and
//! destroying sessions. A record that disappears mid-read is simply absent from
//! the result.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::SessionContext;
use crate::error::{AgentsError, Result};
use crate::liveness::{Liveness, ProcessProbe, SignalZeroProbe};
use crate::storage::StorageConfig;
use crate::store::{FsSessionStore, SessionStore};

const MAX_ID_ATTEMPTS: u32 = 8;

/// Metadata persisted for each session.
///
/// Unknown fields in `meta.json` are ignored so newer writers stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    #[serde(default)]
    pub session_id: String,
    pub started: DateTime<Utc>,
    /// Pid of the supervising process; sessions without one are never reaped.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Directory the session was launched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

pub struct SessionRegistry {
    store: Box<dyn SessionStore>,
    probe: Box<dyn ProcessProbe>,
}

impl SessionRegistry {
    /// Filesystem-backed registry using `kill(pid, 0)` liveness.
    pub fn open(storage: StorageConfig) -> Self {
        Self::new(FsSessionStore::new(storage), SignalZeroProbe)
    }

    pub fn new(store: impl SessionStore + 'static, probe: impl ProcessProbe + 'static) -> Self {
        Self {
            store: Box::new(store),
            probe: Box::new(probe),
        }
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Registers a new session owned by `pid` and returns its id.
    pub fn create(&self, pid: u32) -> Result<String> {
        self.create_in(pid, None)
    }

    /// Like [`create`](Self::create), also recording the launch directory.
    pub fn create_in(&self, pid: u32, cwd: Option<&Path>) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let meta = SessionMeta {
                session_id: ulid::Ulid::new().to_string().to_lowercase(),
                started: Utc::now(),
                pid: Some(pid),
                cwd: cwd.map(|p| p.to_string_lossy().to_string()),
            };
            if self.store.create(&meta)? {
                info!(session = %meta.session_id, pid, "Registered session");
                return Ok(meta.session_id);
            }
            debug!(session = %meta.session_id, "Session id collision, retrying");
        }
        Err(AgentsError::SessionIdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Returns a session's metadata; missing and corrupt records are both `None`.
    pub fn get(&self, session_id: &str) -> Option<SessionMeta> {
        if session_id.is_empty() {
            return None;
        }
        self.store.read_meta(session_id)
    }

    /// All readable sessions, most recently started first.
    ///
    /// Every call re-reads the store.
    pub fn list(&self) -> Vec<SessionMeta> {
        let mut sessions: Vec<SessionMeta> = self
            .store
            .session_ids()
            .iter()
            .filter_map(|id| self.store.read_meta(id))
            .collect();
        sessions.sort_by(|a, b| {
            b.started
                .cmp(&a.started)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        sessions
    }

    /// Resolves the current session from the caller's context.
    pub fn current<'a>(&self, ctx: &'a SessionContext) -> Option<&'a str> {
        ctx.session_id()
    }

    /// True if the session has a record container on disk.
    pub fn exists(&self, session_id: &str) -> bool {
        self.store.exists(session_id)
    }

    /// Destroys a session's record and file log.
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let removed = self.store.delete(session_id)?;
        if removed {
            info!(session = %session_id, "Removed session");
        }
        Ok(removed)
    }

    /// Removes every session whose owning process is confirmed dead.
    ///
    /// Sessions with unreadable metadata, no pid, or an inconclusive probe are kept.
    pub fn cleanup_stale(&self) -> usize {
        let mut removed = 0;
        for session_id in self.store.session_ids() {
            let Some(meta) = self.store.read_meta(&session_id) else {
                continue;
            };
            let Some(pid) = meta.pid else {
                continue;
            };

            match self.probe.probe(pid) {
                Liveness::Dead => match self.store.delete(&session_id) {
                    Ok(true) => {
                        info!(session = %session_id, pid, "Removed stale session");
                        removed += 1;
                    }
                    // Another cleaner got there first.
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, session = %session_id, "Failed to remove stale session");
                    }
                },
                Liveness::Unknown => {
                    debug!(session = %session_id, pid, "Liveness unknown, keeping session");
                }
                Liveness::Alive => {}
            }
        }
        removed
    }
}
