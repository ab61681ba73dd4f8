//! # agents-core
//!
//! Shared coordination logic for concurrent agent sessions working on one tree.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Hooks are short-lived processes.
//! - **Filesystem is the database**: No in-process locks. Each session owns one
//!   directory and is the only writer of its file log.
//! - **Graceful degradation**: Missing or corrupt records read as "not found" and
//!   empty sets, never as errors. Collision detection is advisory.
//! - **Explicit context**: The "current session" is a value passed in, resolved
//!   from the environment only at binary boundaries.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agents_core::{FileClaims, SessionContext, SessionRegistry, StorageConfig};
//!
//! let registry = SessionRegistry::open(StorageConfig::resolve()?);
//! let claims = FileClaims::new(&registry);
//! let ctx = SessionContext::from_env();
//! claims.track("src/main.rs", ctx.session_id());
//! if let Some(owner) = claims.is_claimed("src/main.rs", ctx.session_id()).owner() {
//!     println!("claimed by {owner}");
//! }
//! ```

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod storage;
pub mod store;
pub mod vcs;

pub use claims::{Claim, FileClaims};
pub use config::AgentsConfig;
pub use context::{SessionContext, SESSION_ENV_VAR};
pub use error::{AgentsError, Result};
pub use liveness::{Liveness, ProcessProbe, SignalZeroProbe};
pub use registry::{SessionMeta, SessionRegistry};
pub use storage::{is_valid_session_id, StorageConfig};
pub use store::{FsSessionStore, MemorySessionStore, SessionStore};
pub use vcs::{GitStatus, UncommittedFiles};
