//! agents-hook: editor-integration hook for concurrent agent sessions.
//!
//! Called by the agent's post-edit hook with the tool event as JSON on stdin.
//! Records the edited file against the current session (`AGENT_SESSION_ID`)
//! and prints a warning when another session already touched it.
//!
//! Tracking is advisory, so every outcome exits 0.

mod handle;

use agents_core::{logging, StorageConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agents-hook")]
#[command(about = "File tracking and collision warnings for agent sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track an edited file and warn on collisions (reads JSON from stdin)
    Handle,
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::resolve();
    let _logging_guard = storage
        .as_ref()
        .ok()
        .and_then(|storage| logging::init(storage, "agents-hook"));

    match cli.command {
        Commands::Handle => {
            let result = match storage {
                Ok(storage) => handle::run(storage),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "agents-hook handle failed");
            }
        }
    }
}
