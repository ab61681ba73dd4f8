//! agents: launch and inspect concurrent agent sessions.
//!
//! ## Subcommands
//!
//! - `run`: register a session and run the agent in a supervised terminal
//! - `list`: active sessions, newest first
//! - `cleanup`: remove sessions whose process is gone
//! - `files`: files touched by a session
//! - `uncommitted`: this session's files with uncommitted changes

mod files;
mod launch;
mod sessions;

use std::ffi::OsString;
use std::io;
use std::process;

use agents_core::{
    logging, AgentsConfig, AgentsError, SessionContext, SessionRegistry, StorageConfig,
};
use agents_pty::PtyError;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agents")]
#[command(about = "Run and coordinate concurrent agent sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent as a new tracked session
    Run {
        /// Arguments passed through to the agent
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },

    /// List active sessions
    List,

    /// Remove sessions whose process has exited
    Cleanup,

    /// Show files touched by a session
    Files {
        /// Session to inspect (defaults to the current session)
        #[arg(long)]
        session: Option<String>,
    },

    /// Show this session's files that have uncommitted changes
    Uncommitted,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] AgentsError),

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() {
    let code = run_cli();
    process::exit(code);
}

/// Everything that needs dropping (the log guard in particular) lives here, so
/// it is flushed before `process::exit`.
fn run_cli() -> i32 {
    let cli = Cli::parse();

    let storage = match StorageConfig::resolve() {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("agents: {e}");
            return 1;
        }
    };
    let _logging_guard = logging::init(&storage, "agents");
    let config = AgentsConfig::load(storage);
    let registry = SessionRegistry::open(config.storage.clone());
    let ctx = SessionContext::from_env();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Commands::Run { args } => launch::run(&config, &registry, args),
        Commands::List => sessions::list(&registry, &ctx, &mut out).map(|()| 0),
        Commands::Cleanup => sessions::cleanup(&registry, &mut out).map(|()| 0),
        Commands::Files { session } => {
            files::files(&registry, &ctx, session.as_deref(), &mut out).map(|()| 0)
        }
        Commands::Uncommitted => {
            files::uncommitted(&config, &registry, &ctx, &mut out).map(|()| 0)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "agents failed");
            eprintln!("agents: {e}");
            1
        }
    }
}
