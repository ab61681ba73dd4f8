//! `agents files` and `agents uncommitted`.

use std::collections::BTreeSet;
use std::io::Write;

use agents_core::{
    AgentsConfig, FileClaims, GitStatus, SessionContext, SessionRegistry, UncommittedFiles,
};

use crate::CliError;

pub fn files(
    registry: &SessionRegistry,
    ctx: &SessionContext,
    session: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let Some(session_id) = session.or_else(|| registry.current(ctx)) else {
        eprintln!("No current session (set AGENT_SESSION_ID or pass --session)");
        return Ok(());
    };
    let files = FileClaims::new(registry).session_files(session_id);
    write_paths(out, &files)
}

pub fn uncommitted(
    config: &AgentsConfig,
    registry: &SessionRegistry,
    ctx: &SessionContext,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let git = GitStatus::in_current_dir(config.vcs_timeout);
    uncommitted_with(registry, ctx, &git, out)
}

fn uncommitted_with(
    registry: &SessionRegistry,
    ctx: &SessionContext,
    vcs: &dyn UncommittedFiles,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let files = FileClaims::new(registry).uncommitted_intersection(ctx, vcs);
    write_paths(out, &files)
}

fn write_paths(out: &mut impl Write, paths: &BTreeSet<String>) -> Result<(), CliError> {
    for path in paths {
        writeln!(out, "{path}")?;
    }
    Ok(())
}
