//! File claim tracking across concurrent sessions.
//!
//! Each session appends the canonical path of every file it touches to its own
//! log. A "claim" is derived, never stored: file F is claimed by session S if F
//! appears in S's log. Claims are not locks. Two sessions may claim the same
//! file; this module only reports the overlap.
//!
//! ## Consistency
//!
//! Reads can race an in-flight append from another process and see the log
//! without its last line. That snapshot is stale, never corrupt. A trailing line
//! without its newline is still taken as a path.
//!
//! ## Owner reporting
//!
//! [`FileClaims::is_claimed`] scans other sessions in registry order (most
//! recently started first) and reports the first match only.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::context::SessionContext;
use crate::paths::canonical_key;
use crate::registry::SessionRegistry;
use crate::vcs::UncommittedFiles;

/// Answer to "is this file claimed by another session?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Unclaimed,
    ClaimedBy(String),
}

impl Claim {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Claim::ClaimedBy(_))
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Claim::ClaimedBy(owner) => Some(owner),
            Claim::Unclaimed => None,
        }
    }
}

/// Read/append access to per-session file logs, backed by a registry.
pub struct FileClaims<'r> {
    registry: &'r SessionRegistry,
}

impl<'r> FileClaims<'r> {
    pub fn new(registry: &'r SessionRegistry) -> Self {
        Self { registry }
    }

    /// Records that `session_id` touched `filepath`.
    ///
    /// Silent no-op without a session or when the session has no record: hooks
    /// call this opportunistically and must never fail the agent's workflow.
    pub fn track(&self, filepath: impl AsRef<Path>, session_id: Option<&str>) {
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return;
        };
        let store = self.registry.store();
        if !store.exists(session_id) {
            debug!(session = %session_id, "Skipping track (session not initialized)");
            return;
        }

        let key = canonical_key(filepath);
        if self.session_files(session_id).contains(&key) {
            return;
        }
        if let Err(e) = store.append_log(session_id, &key) {
            warn!(error = %e, session = %session_id, path = %key, "Failed to track file");
        }
    }

    /// Every path in the session's log. Empty if the log does not exist.
    pub fn session_files(&self, session_id: &str) -> BTreeSet<String> {
        match self.registry.store().read_log(session_id) {
            Some(bytes) => parse_log(&bytes),
            None => BTreeSet::new(),
        }
    }

    /// Finds another session that has touched `filepath`.
    ///
    /// `session_id` is excluded from the scan, so a session never claims against itself.
    pub fn is_claimed(&self, filepath: impl AsRef<Path>, session_id: Option<&str>) -> Claim {
        let key = canonical_key(filepath);
        for meta in self.registry.list() {
            if Some(meta.session_id.as_str()) == session_id {
                continue;
            }
            if self.session_files(&meta.session_id).contains(&key) {
                return Claim::ClaimedBy(meta.session_id);
            }
        }
        Claim::Unclaimed
    }

    /// [`is_claimed`](Self::is_claimed) on behalf of the context's session.
    pub fn is_claimed_in(&self, filepath: impl AsRef<Path>, ctx: &SessionContext) -> Claim {
        self.is_claimed(filepath, self.registry.current(ctx))
    }

    /// Files touched by the context's session; empty when no session is active.
    pub fn my_files(&self, ctx: &SessionContext) -> BTreeSet<String> {
        match self.registry.current(ctx) {
            Some(session_id) => self.session_files(session_id),
            None => BTreeSet::new(),
        }
    }

    /// Files touched by the context's session that also have uncommitted changes.
    ///
    /// The status query is skipped entirely when the session has touched nothing.
    pub fn uncommitted_intersection(
        &self,
        ctx: &SessionContext,
        vcs: &dyn UncommittedFiles,
    ) -> BTreeSet<String> {
        let mine = self.my_files(ctx);
        if mine.is_empty() {
            return mine;
        }
        let uncommitted = vcs.uncommitted();
        mine.intersection(&uncommitted).cloned().collect()
    }
}

/// Parses a newline-delimited log, ignoring blank lines and stray `\r`.
fn parse_log(bytes: &[u8]) -> BTreeSet<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::{Liveness, ProcessProbe};
    use crate::registry::SessionMeta;
    use crate::store::{MemorySessionStore, SessionStore};
    use chrono::{Duration, Utc};
    use std::cell::Cell;

    struct AlwaysAlive;

    impl ProcessProbe for AlwaysAlive {
        fn probe(&self, _pid: u32) -> Liveness {
            Liveness::Alive
        }
    }

    struct FixedStatus {
        files: BTreeSet<String>,
        calls: Cell<u32>,
    }

    impl UncommittedFiles for FixedStatus {
        fn uncommitted(&self) -> BTreeSet<String> {
            self.calls.set(self.calls.get() + 1);
            self.files.clone()
        }
    }

    fn registry_with(sessions: &[(&str, i64)]) -> SessionRegistry {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        for (id, minutes_ago) in sessions {
            store
                .create(&SessionMeta {
                    session_id: id.to_string(),
                    started: now - Duration::minutes(*minutes_ago),
                    pid: Some(1),
                    cwd: None,
                })
                .unwrap();
        }
        SessionRegistry::new(store, AlwaysAlive)
    }

    #[test]
    fn test_track_is_idempotent() {
        let registry = registry_with(&[("s", 0)]);
        let claims = FileClaims::new(&registry);

        claims.track("/x/file.rs", Some("s"));
        claims.track("/x/file.rs", Some("s"));

        let raw = registry.store().read_log("s").unwrap();
        assert_eq!(String::from_utf8(raw).unwrap().lines().count(), 1);
        assert_eq!(claims.session_files("s").len(), 1);
    }

    #[test]
    fn test_track_without_session_is_noop() {
        let registry = registry_with(&[("s", 0)]);
        let claims = FileClaims::new(&registry);

        claims.track("/x", None);
        claims.track("/x", Some(""));
        claims.track("/x", Some("not-registered"));

        assert!(claims.session_files("s").is_empty());
        assert!(!registry.exists("not-registered"));
    }

    #[test]
    fn test_log_parsing_tolerates_partial_trailing_line() {
        let store = MemorySessionStore::new();
        store.set_raw_log("s", b"/a\n\n/b\r\n/partial");
        let registry = SessionRegistry::new(store, AlwaysAlive);
        let claims = FileClaims::new(&registry);

        let expected: BTreeSet<String> = ["/a", "/b", "/partial"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(claims.session_files("s"), expected);
        assert!(claims.session_files("missing").is_empty());
    }

    #[test]
    fn test_self_is_never_a_claimant() {
        let registry = registry_with(&[("a", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/shared/f", Some("a"));
        assert_eq!(claims.is_claimed("/shared/f", Some("a")), Claim::Unclaimed);
    }

    #[test]
    fn test_other_session_claim_is_reported() {
        let registry = registry_with(&[("a", 5), ("b", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/x", Some("a"));

        let claim = claims.is_claimed("/x", Some("b"));
        assert!(claim.is_claimed());
        assert_eq!(claim.owner(), Some("a"));
    }

    #[test]
    fn test_most_recent_claimant_wins() {
        let registry = registry_with(&[("older", 30), ("newer", 1), ("other", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/y", Some("older"));
        claims.track("/y", Some("newer"));

        assert_eq!(
            claims.is_claimed("/y", Some("other")),
            Claim::ClaimedBy("newer".to_string())
        );
    }

    #[test]
    fn test_is_claimed_in_uses_context_session() {
        let registry = registry_with(&[("a", 1), ("b", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/z", Some("a"));

        let ctx = SessionContext::with_session("a");
        assert_eq!(claims.is_claimed_in("/z", &ctx), Claim::Unclaimed);
        assert_eq!(
            claims.is_claimed_in("/z", &SessionContext::none()),
            Claim::ClaimedBy("a".to_string())
        );
    }

    #[test]
    fn test_my_files_without_session_is_empty() {
        let registry = registry_with(&[("a", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/q", Some("a"));
        assert!(claims.my_files(&SessionContext::none()).is_empty());
        assert_eq!(claims.my_files(&SessionContext::with_session("a")).len(), 1);
    }

    #[test]
    fn test_intersection_skips_status_when_nothing_tracked() {
        let registry = registry_with(&[("a", 0)]);
        let claims = FileClaims::new(&registry);
        let status = FixedStatus {
            files: ["/m".to_string()].into_iter().collect(),
            calls: Cell::new(0),
        };

        let ctx = SessionContext::with_session("a");
        assert!(claims.uncommitted_intersection(&ctx, &status).is_empty());
        assert_eq!(status.calls.get(), 0);
    }

    #[test]
    fn test_intersection_keeps_only_uncommitted() {
        let registry = registry_with(&[("a", 0)]);
        let claims = FileClaims::new(&registry);
        claims.track("/m", Some("a"));
        claims.track("/clean", Some("a"));
        let status = FixedStatus {
            files: ["/m".to_string(), "/other".to_string()].into_iter().collect(),
            calls: Cell::new(0),
        };

        let ctx = SessionContext::with_session("a");
        let result = claims.uncommitted_intersection(&ctx, &status);
        assert_eq!(result, ["/m".to_string()].into_iter().collect());
        assert_eq!(status.calls.get(), 1);
    }
}
