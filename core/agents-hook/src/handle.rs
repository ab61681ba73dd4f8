//! Hook event handling.
//!
//! ```text
//! stdin JSON ─ parse ─ tool_input.file_path ─ track ─ is_claimed ─ warning on stdout
//! ```
//!
//! Empty input, malformed JSON and events without a path are silent no-ops.

use std::io::{self, Read};

use agents_core::{
    AgentsConfig, AgentsError, FileClaims, SessionContext, SessionRegistry, StorageConfig,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to read hook input: {0}")]
    ReadInput(#[from] io::Error),

    #[error(transparent)]
    Core(#[from] AgentsError),
}

#[derive(Debug, Default, Deserialize)]
struct HookInput {
    #[serde(default)]
    tool_input: Option<ToolInput>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolInput {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    notebook_path: Option<String>,
}

impl HookInput {
    fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(input) => Some(input),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed hook input");
                None
            }
        }
    }

    fn file_path(&self) -> Option<&str> {
        let tool_input = self.tool_input.as_ref()?;
        tool_input
            .file_path
            .as_deref()
            .or(tool_input.notebook_path.as_deref())
            .filter(|path| !path.is_empty())
    }
}

pub fn run(storage: StorageConfig) -> Result<(), HookError> {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;

    let config = AgentsConfig::load(storage);
    let registry = SessionRegistry::open(config.storage);
    let ctx = SessionContext::from_env();

    if let Some(warning) = process(&raw, &registry, &ctx) {
        println!("{warning}");
    }
    Ok(())
}

/// Tracks the event's file and returns the collision warning, if any.
fn process(raw: &str, registry: &SessionRegistry, ctx: &SessionContext) -> Option<String> {
    let input = HookInput::parse(raw)?;
    let file_path = input.file_path()?;

    let claims = FileClaims::new(registry);
    claims.track(file_path, ctx.session_id());

    let claim = claims.is_claimed_in(file_path, ctx);
    let owner = claim.owner()?;
    tracing::info!(file = %file_path, owner = %owner, "Collision detected");
    Some(collision_warning(file_path, owner))
}

fn collision_warning(file_path: &str, owner: &str) -> String {
    format!(
        "File claimed by another session: {file_path}\n\
         Session: {owner}. Run `agents list` to see details."
    )
}
