//! Pluggable persistence for session records and file logs.
//!
//! [`FsSessionStore`] is the production backend: one directory per session with a
//! JSON metadata record and a newline-delimited file log. [`MemorySessionStore`]
//! runs the same coordination logic in tests without touching disk.
//!
//! # Defensive Design
//!
//! Other processes create and destroy session directories at any time, so:
//! - A missing or corrupt `meta.json` reads as "no such session"
//! - A missing `files.txt` reads as "no log"
//! - Deleting an already-deleted session is not an error
//! - An id that is not a single path name (`..`, `a/b`) never touches disk
//!
//! # Atomic Writes
//!
//! Metadata is written to a temp file in the session directory and renamed into
//! place. Log entries are appended with a single `write` of one line, which the
//! OS applies atomically for the sizes involved.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::sync::{Mutex, MutexGuard};

use fs_err as fs;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{AgentsError, Result};
use crate::registry::SessionMeta;
use crate::storage::{is_valid_session_id, StorageConfig};

/// Storage operations the registry and claim tracker are written against.
pub trait SessionStore: Send + Sync {
    /// Creates a new record. Returns `Ok(false)` if the id is already taken.
    fn create(&self, meta: &SessionMeta) -> Result<bool>;

    /// Reads a session's metadata. Unreadable or corrupt records are `None`.
    fn read_meta(&self, session_id: &str) -> Option<SessionMeta>;

    /// Ids of every session record currently present, in no particular order.
    fn session_ids(&self) -> Vec<String>;

    /// True if the session's record container exists.
    fn exists(&self, session_id: &str) -> bool;

    /// Raw bytes of the session's file log, or `None` if it has no log.
    fn read_log(&self, session_id: &str) -> Option<Vec<u8>>;

    /// Appends one entry (without newline) to the session's file log.
    fn append_log(&self, session_id: &str, entry: &str) -> Result<()>;

    /// Destroys the record and its log. Returns `Ok(false)` if it was already gone.
    fn delete(&self, session_id: &str) -> Result<bool>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Filesystem backend
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FsSessionStore {
    storage: StorageConfig,
}

impl FsSessionStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    fn check_id(session_id: &str) -> Result<()> {
        if is_valid_session_id(session_id) {
            Ok(())
        } else {
            Err(AgentsError::InvalidSessionId {
                id: session_id.to_string(),
            })
        }
    }

    fn write_meta(&self, meta: &SessionMeta) -> Result<()> {
        let session_dir = self.storage.session_dir(&meta.session_id);
        let content = serde_json::to_string_pretty(meta).map_err(|source| AgentsError::Json {
            context: format!("serialize metadata for {}", meta.session_id),
            source,
        })?;

        let mut temp_file = NamedTempFile::new_in(&session_dir)
            .map_err(|e| AgentsError::io("create temp metadata file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| AgentsError::io("write temp metadata file", e))?;
        temp_file
            .flush()
            .map_err(|e| AgentsError::io("flush temp metadata file", e))?;
        temp_file
            .persist(self.storage.meta_file(&meta.session_id))
            .map_err(|e| AgentsError::io("persist metadata file", e.error))?;
        Ok(())
    }
}

impl SessionStore for FsSessionStore {
    fn create(&self, meta: &SessionMeta) -> Result<bool> {
        Self::check_id(&meta.session_id)?;
        let sessions_dir = self.storage.sessions_dir();
        fs::create_dir_all(sessions_dir).map_err(|source| AgentsError::RegistryUnavailable {
            path: sessions_dir.to_path_buf(),
            source,
        })?;

        let session_dir = self.storage.session_dir(&meta.session_id);
        match fs::create_dir(&session_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(source) => {
                return Err(AgentsError::RegistryUnavailable {
                    path: session_dir,
                    source,
                })
            }
        }

        if let Err(err) = self.write_meta(meta) {
            // Half-created records would read as corrupt forever; roll back.
            let _ = fs::remove_dir_all(&session_dir);
            return Err(err);
        }
        Ok(true)
    }

    fn read_meta(&self, session_id: &str) -> Option<SessionMeta> {
        if !is_valid_session_id(session_id) {
            return None;
        }
        let path = self.storage.meta_file(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(error = %e, session = %session_id, "Unreadable session metadata");
                return None;
            }
        };

        match serde_json::from_str::<SessionMeta>(&content) {
            Ok(mut meta) => {
                // The directory name is authoritative for identity.
                meta.session_id = session_id.to_string();
                Some(meta)
            }
            Err(e) => {
                debug!(error = %e, session = %session_id, "Corrupt session metadata");
                None
            }
        }
    }

    fn session_ids(&self) -> Vec<String> {
        let entries = match fs::read_dir(self.storage.sessions_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read sessions directory");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()
    }

    fn exists(&self, session_id: &str) -> bool {
        is_valid_session_id(session_id) && self.storage.session_dir(session_id).is_dir()
    }

    fn read_log(&self, session_id: &str) -> Option<Vec<u8>> {
        if !is_valid_session_id(session_id) {
            return None;
        }
        match fs::read(self.storage.files_log(session_id)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, session = %session_id, "Failed to read file log");
                None
            }
        }
    }

    fn append_log(&self, session_id: &str, entry: &str) -> Result<()> {
        Self::check_id(session_id)?;
        let mut line = String::with_capacity(entry.len() + 1);
        line.push_str(entry);
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.storage.files_log(session_id))
            .map_err(|e| AgentsError::io(format!("open file log for {session_id}"), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| AgentsError::io(format!("append to file log for {session_id}"), e))
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        if !is_valid_session_id(session_id) {
            return Ok(false);
        }
        match fs::remove_dir_all(self.storage.session_dir(session_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AgentsError::io(format!("remove session {session_id}"), e)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory backend
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct MemoryRecord {
    meta: Option<SessionMeta>,
    log: Option<Vec<u8>>,
}

/// Store used by tests. A record with `meta: None` models a corrupt `meta.json`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<BTreeMap<String, MemoryRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session whose metadata cannot be parsed.
    pub fn insert_corrupt(&self, session_id: &str) {
        self.records()
            .insert(session_id.to_string(), MemoryRecord::default());
    }

    /// Replaces a session's raw log bytes.
    pub fn set_raw_log(&self, session_id: &str, bytes: &[u8]) {
        self.records()
            .entry(session_id.to_string())
            .or_default()
            .log = Some(bytes.to_vec());
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<String, MemoryRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, meta: &SessionMeta) -> Result<bool> {
        let mut records = self.records();
        if records.contains_key(&meta.session_id) {
            return Ok(false);
        }
        records.insert(
            meta.session_id.clone(),
            MemoryRecord {
                meta: Some(meta.clone()),
                log: None,
            },
        );
        Ok(true)
    }

    fn read_meta(&self, session_id: &str) -> Option<SessionMeta> {
        self.records()
            .get(session_id)
            .and_then(|record| record.meta.clone())
    }

    fn session_ids(&self) -> Vec<String> {
        self.records().keys().cloned().collect()
    }

    fn exists(&self, session_id: &str) -> bool {
        self.records().contains_key(session_id)
    }

    fn read_log(&self, session_id: &str) -> Option<Vec<u8>> {
        self.records()
            .get(session_id)
            .and_then(|record| record.log.clone())
    }

    fn append_log(&self, session_id: &str, entry: &str) -> Result<()> {
        let mut records = self.records();
        let record = records.get_mut(session_id).ok_or_else(|| {
            AgentsError::io(
                format!("open file log for {session_id}"),
                std::io::Error::from(ErrorKind::NotFound),
            )
        })?;
        let log = record.log.get_or_insert_with(Vec::new);
        log.extend_from_slice(entry.as_bytes());
        log.push(b'\n');
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.records().remove(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn meta(id: &str) -> SessionMeta {
        SessionMeta {
            session_id: id.to_string(),
            started: Utc::now(),
            pid: Some(42),
            cwd: None,
        }
    }

    #[test]
    fn test_fs_create_writes_meta_and_rejects_duplicates() {
        let temp = tempdir().unwrap();
        let store = FsSessionStore::new(StorageConfig::with_root(temp.path().to_path_buf()));

        assert!(store.create(&meta("s1")).unwrap());
        assert!(!store.create(&meta("s1")).unwrap());
        assert!(store.storage().meta_file("s1").exists());
        assert_eq!(store.read_meta("s1").unwrap().pid, Some(42));
    }

    #[test]
    fn test_fs_corrupt_meta_reads_as_missing() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let store = FsSessionStore::new(storage.clone());
        std::fs::create_dir_all(storage.session_dir("bad")).unwrap();
        std::fs::write(storage.meta_file("bad"), "{ not json").unwrap();

        assert!(store.read_meta("bad").is_none());
        assert!(store.exists("bad"));
    }

    #[test]
    fn test_fs_meta_ignores_unknown_fields_and_uses_dir_name() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let store = FsSessionStore::new(storage.clone());
        std::fs::create_dir_all(storage.session_dir("real-id")).unwrap();
        std::fs::write(
            storage.meta_file("real-id"),
            r#"{"session_id":"other","started":"2026-01-31T00:00:00Z","pid":7,"branch":"main"}"#,
        )
        .unwrap();

        let meta = store.read_meta("real-id").unwrap();
        assert_eq!(meta.session_id, "real-id");
        assert_eq!(meta.pid, Some(7));
    }

    #[test]
    fn test_fs_session_ids_skips_plain_files() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let store = FsSessionStore::new(storage.clone());
        store.create(&meta("a")).unwrap();
        std::fs::write(storage.sessions_dir().join("stray.txt"), "x").unwrap();

        assert_eq!(store.session_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_fs_missing_sessions_dir_is_empty() {
        let temp = tempdir().unwrap();
        let store = FsSessionStore::new(StorageConfig::with_root(temp.path().join("nope")));
        assert!(store.session_ids().is_empty());
        assert!(store.read_log("x").is_none());
    }

    #[test]
    fn test_fs_append_and_delete() {
        let temp = tempdir().unwrap();
        let store = FsSessionStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
        store.create(&meta("s1")).unwrap();

        store.append_log("s1", "/a").unwrap();
        store.append_log("s1", "/b").unwrap();
        assert_eq!(store.read_log("s1").unwrap(), b"/a\n/b\n");

        assert!(store.delete("s1").unwrap());
        assert!(!store.delete("s1").unwrap());
        assert!(!store.exists("s1"));
    }

    #[test]
    fn test_fs_append_without_session_dir_fails() {
        let temp = tempdir().unwrap();
        let store = FsSessionStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
        assert!(store.append_log("ghost", "/a").is_err());
    }

    #[test]
    fn test_fs_ids_outside_sessions_dir_are_rejected() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let store = FsSessionStore::new(storage.clone());
        store.create(&meta("s1")).unwrap();
        std::fs::write(temp.path().join("files.txt"), "/outside\n").unwrap();

        for bad in ["..", ".", "", "../sessions/s1", "s1/.."] {
            assert!(!store.exists(bad), "{bad:?} exists");
            assert!(store.read_meta(bad).is_none());
            assert!(store.read_log(bad).is_none());
            assert!(matches!(
                store.append_log(bad, "/etc/passwd"),
                Err(AgentsError::InvalidSessionId { .. })
            ));
            assert!(matches!(
                store.create(&meta(bad)),
                Err(AgentsError::InvalidSessionId { .. })
            ));
            assert!(!store.delete(bad).unwrap());
        }

        assert_eq!(
            std::fs::read_to_string(temp.path().join("files.txt")).unwrap(),
            "/outside\n"
        );
        assert!(storage.sessions_dir().is_dir());
        assert!(store.exists("s1"));
    }

    #[test]
    fn test_fs_create_reports_unavailable_registry() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = FsSessionStore::new(StorageConfig::with_root(blocker));

        let err = store.create(&meta("s1")).unwrap_err();
        assert!(matches!(err, AgentsError::RegistryUnavailable { .. }));
    }

    #[test]
    fn test_memory_store_models_corrupt_records() {
        let store = MemorySessionStore::new();
        store.insert_corrupt("bad");
        assert!(store.exists("bad"));
        assert!(store.read_meta("bad").is_none());
    }

    #[test]
    fn test_memory_append_requires_record() {
        let store = MemorySessionStore::new();
        assert!(store.append_log("ghost", "/a").is_err());
        store.create(&meta("s1")).unwrap();
        store.append_log("s1", "/a").unwrap();
        assert_eq!(store.read_log("s1").unwrap(), b"/a\n");
    }
}
