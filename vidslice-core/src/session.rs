//! Engine session: the explicit, singleton-mount invocation context.
//!
//! The engine workspace is a shared singleton: only one asset may be
//! mounted at a time, and a second mount before unmounting the first is
//! undefined behavior on the engine side. The session owns that bookkeeping
//! so the rest of the crate cannot get it wrong: every operation that needs
//! an input runs inside [`Session::with_mounted`], which releases the mount
//! on every exit path and never lets a cleanup failure mask the operation's
//! own result.
//!
//! There is deliberately no parallelism here: one invocation is in flight at
//! a time, and batch callers iterate assets strictly one after another.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::engine::{Engine, Mounted};
use crate::error::{CoreError, CoreResult};

pub struct Session<E> {
    engine: E,
    mounted: Option<PathBuf>,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            mounted: None,
        }
    }

    /// Mounts `source`, runs `op`, and always unmounts afterward.
    pub(crate) fn with_mounted<T>(
        &mut self,
        source: &Path,
        op: impl FnOnce(&mut Self, &Mounted) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mounted = self.mount(source)?;
        let result = op(self, &mounted);
        if let Err(e) = self.unmount() {
            warn!("failed to unmount '{}': {e}", source.display());
        }
        result
    }

    fn mount(&mut self, source: &Path) -> CoreResult<Mounted> {
        if let Some(existing) = &self.mounted {
            return Err(CoreError::MountConflict(existing.display().to_string()));
        }
        self.engine.ensure_ready()?;
        let mounted = self.engine.mount(source)?;
        self.mounted = Some(source.to_path_buf());
        Ok(mounted)
    }

    fn unmount(&mut self) -> CoreResult<()> {
        if self.mounted.take().is_some() {
            self.engine.unmount()
        } else {
            Ok(())
        }
    }

    pub(crate) fn exec(
        &mut self,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> CoreResult<()> {
        self.engine.exec(args, on_line)
    }

    pub(crate) fn read_artifact(&mut self, name: &str) -> CoreResult<Vec<u8>> {
        self.engine.read_artifact(name)
    }

    /// Best-effort artifact removal. Failures are logged and swallowed; the
    /// artifact may legitimately be absent on some engine configurations.
    pub(crate) fn discard_artifact(&mut self, name: &str) {
        if let Err(e) = self.engine.delete_artifact(name) {
            debug!("could not delete workspace artifact '{name}': {e}");
        }
    }

    /// Consumes the session, returning the engine. Mainly useful for
    /// inspecting a test double after a run.
    pub fn into_engine(self) -> E {
        self.engine
    }
}
