//! Path canonicalization for claim matching.
//!
//! Hooks run in different working directories and receive paths spelled however
//! the agent spelled them. Every path is canonicalized before it is written to a
//! log and before it is compared, so `./a/../a/f.txt`, `/abs/a/f.txt` and a
//! symlinked spelling of the same file all collapse to one string.
//!
//! Resolution is non-strict: the file does not have to exist yet (a Write hook
//! may fire for a path that was just created or later deleted). The longest
//! existing prefix is resolved through the filesystem, the rest is folded lexically.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolves `path` to an absolute, symlink-free form relative to the process cwd.
pub fn canonicalize(path: impl AsRef<Path>) -> PathBuf {
    let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    canonicalize_from(&base, path.as_ref())
}

/// Resolves `path` against `base` instead of the process working directory.
pub fn canonicalize_from(base: &Path, path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    if let Ok(resolved) = std::fs::canonicalize(&absolute) {
        return resolved;
    }

    let normalized = normalize_lexically(&absolute);

    // Walk up to the deepest ancestor that exists, resolve it, re-attach the tail.
    let mut existing = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(resolved) = std::fs::canonicalize(existing) {
            let mut out = resolved;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Folds `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Canonical form as a log/comparison key.
pub fn canonical_key(path: impl AsRef<Path>) -> String {
    canonicalize(path).to_string_lossy().to_string()
}
