//! `agents list` and `agents cleanup`.

use std::io::Write;

use agents_core::{FileClaims, SessionContext, SessionMeta, SessionRegistry};
use chrono::{DateTime, Utc};

use crate::CliError;

pub fn list(
    registry: &SessionRegistry,
    ctx: &SessionContext,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let sessions = registry.list();
    if sessions.is_empty() {
        writeln!(out, "No active sessions")?;
        return Ok(());
    }

    let claims = FileClaims::new(registry);
    let current = registry.current(ctx);
    let now = Utc::now();
    for meta in &sessions {
        let file_count = claims.session_files(&meta.session_id).len();
        let is_current = current == Some(meta.session_id.as_str());
        writeln!(out, "{}", format_row(meta, file_count, is_current, now))?;
    }
    Ok(())
}

pub fn cleanup(registry: &SessionRegistry, out: &mut impl Write) -> Result<(), CliError> {
    let removed = registry.cleanup_stale();
    let noun = if removed == 1 { "session" } else { "sessions" };
    writeln!(out, "Removed {removed} stale {noun}")?;
    Ok(())
}

fn format_row(
    meta: &SessionMeta,
    file_count: usize,
    is_current: bool,
    now: DateTime<Utc>,
) -> String {
    let marker = if is_current { "*" } else { " " };
    let pid = meta
        .pid
        .map_or_else(|| "-".to_string(), |pid| pid.to_string());
    let files = if file_count == 1 { "file" } else { "files" };
    format!(
        "{marker} {id}  {started:<10}  pid {pid:<8}  {file_count} {files}",
        id = meta.session_id,
        started = time_ago(meta.started, now),
    )
}

/// `just now`, `Nm ago` or `Nh ago`. A start time in the future (clock skew
/// between hosts sharing the directory) reads as `unknown`.
pub fn time_ago(started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(started);
    if elapsed < chrono::Duration::zero() {
        return "unknown".to_string();
    }
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else {
        format!("{}h ago", minutes / 60)
    }
}
