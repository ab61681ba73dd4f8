//! `agents run`: register a session, then hand the terminal to the agent.

use std::ffi::OsString;

use agents_core::{AgentsConfig, SessionRegistry, SESSION_ENV_VAR};
use agents_pty::{AgentCommand, Supervisor};
use tracing::{info, warn};

use crate::CliError;

/// Returns the exit status for the launcher: the agent's own status, or 0
/// when the session was stopped by SIGTERM/SIGHUP.
pub fn run(
    config: &AgentsConfig,
    registry: &SessionRegistry,
    args: Vec<OsString>,
) -> Result<i32, CliError> {
    let removed = registry.cleanup_stale();
    if removed > 0 {
        info!(removed, "Removed stale sessions before launch");
    }

    let cwd = std::env::current_dir().ok();
    let session_id = registry.create_in(std::process::id(), cwd.as_deref())?;
    info!(session = %session_id, "Session registered");

    let command = agent_command(config, &session_id, args);
    match Supervisor::new(config.poll_interval).run(&command) {
        Ok(reason) => Ok(reason.exit_code()),
        Err(e) => {
            // The agent never ran (or was torn down during setup), so the
            // registration has nothing to describe.
            if let Err(remove_err) = registry.remove(&session_id) {
                warn!(session = %session_id, error = %remove_err, "Failed to roll back session");
            }
            Err(e.into())
        }
    }
}

fn agent_command(config: &AgentsConfig, session_id: &str, args: Vec<OsString>) -> AgentCommand {
    AgentCommand::agent(&config.agent_bin, &config.system_prompt_file, args)
        .env(SESSION_ENV_VAR, session_id)
}
