//! # agents-pty
//!
//! Runs one interactive agent process inside a fresh pseudo-terminal and proxies
//! the invoking terminal to it, so the agent believes it owns the user's terminal.
//!
//! ## Lifecycle
//!
//! ```text
//! Init → Spawned → Running ⇄ (resize) → Draining → done
//!                     └──── terminate ─────────────→ done
//! ```
//!
//! - **Init**: open a pty pair, copying the real terminal's attributes and size.
//! - **Spawned**: start the child on the slave side, close our slave copy, put
//!   the real terminal in raw mode.
//! - **Running**: poll the master and the real input with a short timeout,
//!   relay bytes verbatim, watch for child exit.
//! - **Draining**: after exit, read whatever the child left in the pty.
//!
//! Whatever path leaves the loop, the real terminal's attributes are restored and
//! the master is closed. Both are owned by RAII guards.
//!
//! Unix only.

pub mod command;
pub mod error;
pub mod signals;
pub mod supervisor;
pub mod terminal;

pub use command::{AgentCommand, SYSTEM_PROMPT_FLAG};
pub use error::{PtyError, Result};
pub use supervisor::{ExitReason, Supervisor, DEFAULT_POLL_INTERVAL};
pub use terminal::ControllingTerminal;
