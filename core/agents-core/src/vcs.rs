//! Uncommitted-change query against the version-control tool.
//!
//! Two bounded git calls share one deadline: `rev-parse --show-toplevel` to find
//! the repository root, then `status --porcelain -z --untracked-files=all`. The
//! result is diagnostic: a missing tool, a non-zero exit, a timeout, or a
//! directory outside any repository all yield an empty set rather than an error.
//!
//! ## Porcelain `-z` format
//!
//! ```text
//! XY path\0
//! XY renamed\0orig\0
//! ```
//!
//! Two status columns, a space, then the path at offset 3, relative to the
//! repository root and never quoted. Rename and copy entries are followed by
//! their source path as a separate entry. Entries that do not fit are skipped.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::paths::canonicalize_from;

/// Default bound on the status query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const WAIT_STEP: Duration = Duration::from_millis(20);
const PATH_OFFSET: usize = 3;

/// Source of "files with uncommitted local modifications".
pub trait UncommittedFiles {
    /// Canonical paths of modified files; empty on any failure.
    fn uncommitted(&self) -> BTreeSet<String>;
}

/// Runs `git status` for the repository containing a working directory.
#[derive(Debug, Clone)]
pub struct GitStatus {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitStatus {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    /// Status of the process working directory.
    pub fn in_current_dir(timeout: Duration) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd, timeout)
    }

    fn toplevel(&self, deadline: Instant) -> Option<PathBuf> {
        let args = ["rev-parse", "--show-toplevel"];
        let output = run_bounded("git", &args, &self.workdir, deadline)?;
        let root = String::from_utf8_lossy(&output)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        (!root.is_empty()).then(|| PathBuf::from(root))
    }
}

impl UncommittedFiles for GitStatus {
    fn uncommitted(&self) -> BTreeSet<String> {
        let deadline = Instant::now() + self.timeout;
        let Some(root) = self.toplevel(deadline) else {
            return BTreeSet::new();
        };
        match run_bounded(
            "git",
            &["status", "--porcelain", "-z", "--untracked-files=all"],
            &root,
            deadline,
        ) {
            Some(output) => parse_porcelain(&String::from_utf8_lossy(&output), &root),
            None => BTreeSet::new(),
        }
    }
}

/// Runs `program` in `workdir`, killing it if it outlives `deadline`.
/// Returns stdout only for a successful exit.
fn run_bounded<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    workdir: &Path,
    deadline: Instant,
) -> Option<Vec<u8>> {
    let mut child = match Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!(error = %e, program, "Version-control tool unavailable");
            return None;
        }
    };

    // Drain stdout concurrently so a large status cannot fill the pipe and stall the child.
    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program, "Version-control query timed out");
                return None;
            }
            Ok(None) => thread::sleep(WAIT_STEP),
            Err(e) => {
                let _ = child.kill();
                debug!(error = %e, "Failed to wait for version-control query");
                return None;
            }
        }
    };

    if !status.success() {
        debug!(status = ?status.code(), program, "Version-control query exited non-zero");
        return None;
    }

    reader.join().ok()?.ok()
}

/// Parses `git status --porcelain -z` output into canonical paths resolved
/// against the repository root `base`.
///
/// Renames contribute both the new and the original path. Copies contribute only
/// the new path; their source is unchanged.
pub fn parse_porcelain(output: &str, base: &Path) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    let mut entries = output.split('\0');
    while let Some(entry) = entries.next() {
        let bytes = entry.as_bytes();
        let Some(path) = entry.get(PATH_OFFSET..) else {
            continue;
        };
        if bytes.get(2) != Some(&b' ') || path.is_empty() {
            continue;
        }

        paths.insert(resolve(base, path));
        match (bytes[0], bytes[1]) {
            (b'R', _) | (_, b'R') => {
                if let Some(source) = entries.next().filter(|s| !s.is_empty()) {
                    paths.insert(resolve(base, source));
                }
            }
            (b'C', _) | (_, b'C') => {
                entries.next();
            }
            _ => {}
        }
    }
    paths
}

fn resolve(base: &Path, relative: &str) -> String {
    canonicalize_from(base, Path::new(relative))
        .to_string_lossy()
        .to_string()
}
