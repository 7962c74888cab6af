//! Interactions with the external transcoding engine.
//!
//! The engine is consumed strictly through a narrow process/stream contract:
//! blocking invocations with an ordered argument list, a synchronous per-line
//! diagnostic tap scoped to each invocation, a singleton mount point for the
//! input asset, and named artifacts in a private workspace.
//!
//! The [`Engine`] trait follows the dependency-injection pattern: production
//! code uses [`SubprocessEngine`], while tests substitute a scripted fake and
//! exercise the planners against canned diagnostic text.

pub mod subprocess;

#[cfg(any(test, feature = "test-mocks"))]
pub mod scripted;

pub use subprocess::SubprocessEngine;

#[cfg(any(test, feature = "test-mocks"))]
pub use scripted::{InvocationScript, ScriptedEngine};

use std::path::{Path, PathBuf};

use crate::error::CoreResult;

/// A mounted input asset: the path reference invocations should use in their
/// argument lists, plus the asset's size in bytes.
#[derive(Debug, Clone)]
pub struct Mounted {
    pub path: PathBuf,
    pub size: u64,
}

/// The process/stream contract of the external transcoding engine.
pub trait Engine {
    /// Verifies the engine is usable. Idempotent; cheap after the first call.
    fn ensure_ready(&mut self) -> CoreResult<()>;

    /// Attaches a source file to the engine workspace and returns the path
    /// reference later invocations should use. The workspace holds at most
    /// one mount at a time; serializing assets is the caller's job (see
    /// [`crate::session::Session`]).
    fn mount(&mut self, source: &Path) -> CoreResult<Mounted>;

    /// Detaches the current mount, if any.
    fn unmount(&mut self) -> CoreResult<()>;

    /// Runs one blocking invocation. Every diagnostic line is handed to
    /// `on_line` verbatim, in arrival order, before this returns. Fails on
    /// nonzero exit; there is no timeout, so an unresponsive invocation
    /// blocks indefinitely.
    fn exec(&mut self, args: &[String], on_line: &mut dyn FnMut(&str)) -> CoreResult<()>;

    /// Reads a named workspace artifact into an owned buffer.
    fn read_artifact(&mut self, name: &str) -> CoreResult<Vec<u8>>;

    /// Removes a named workspace artifact.
    fn delete_artifact(&mut self, name: &str) -> CoreResult<()>;
}
