//! Scripted engine for tests.
//!
//! Each queued [`InvocationScript`] describes one expected invocation: the
//! diagnostic lines it prints, the artifacts it leaves in the workspace, and
//! how it exits. Invocations are consumed in order and every received
//! argument list is recorded, so tests can assert on the exact commands the
//! planners issued. Running out of scripts is a test bug and panics.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;

use super::{Engine, Mounted};
use crate::error::{CoreError, CoreResult};

/// One expected invocation and its outcome.
pub struct InvocationScript {
    lines: Vec<String>,
    artifacts: Vec<(String, Vec<u8>)>,
    failure: Option<String>,
}

impl InvocationScript {
    /// A successful invocation that prints `lines`.
    pub fn ok(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| (*l).to_string()).collect(),
            artifacts: Vec::new(),
            failure: None,
        }
    }

    /// A failing invocation that prints `lines` before exiting nonzero.
    pub fn failing(lines: &[&str], message: &str) -> Self {
        Self {
            lines: lines.iter().map(|l| (*l).to_string()).collect(),
            artifacts: Vec::new(),
            failure: Some(message.to_string()),
        }
    }

    /// Adds an artifact the invocation leaves behind in the workspace.
    #[must_use]
    pub fn with_artifact(mut self, name: &str, data: Vec<u8>) -> Self {
        self.artifacts.push((name.to_string(), data));
        self
    }
}

/// Engine test double with a queue of invocation scripts.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: VecDeque<InvocationScript>,
    artifacts: HashMap<String, Vec<u8>>,
    mount_size: u64,
    /// Argument lists of every invocation received, in order.
    pub calls: Vec<Vec<String>>,
    /// Names passed to `delete_artifact`, in order.
    pub deleted: Vec<String>,
    /// Count of unmount calls, for cleanup-symmetry assertions.
    pub unmounts: usize,
}

impl ScriptedEngine {
    /// Creates an engine whose mounts report `mount_size` bytes.
    pub fn new(mount_size: u64) -> Self {
        Self {
            mount_size,
            ..Self::default()
        }
    }

    /// Queues the next expected invocation.
    pub fn expect(&mut self, script: InvocationScript) {
        self.scripts.push_back(script);
    }

    /// Names of artifacts still present in the workspace.
    pub fn artifact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Engine for ScriptedEngine {
    fn ensure_ready(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn mount(&mut self, source: &Path) -> CoreResult<Mounted> {
        Ok(Mounted {
            path: source.to_path_buf(),
            size: self.mount_size,
        })
    }

    fn unmount(&mut self) -> CoreResult<()> {
        self.unmounts += 1;
        Ok(())
    }

    fn exec(&mut self, args: &[String], on_line: &mut dyn FnMut(&str)) -> CoreResult<()> {
        self.calls.push(args.to_vec());

        let script = self
            .scripts
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted invocation left for args: {args:?}"));

        for line in &script.lines {
            on_line(line);
        }
        for (name, data) in script.artifacts {
            self.artifacts.insert(name, data);
        }

        match script.failure {
            None => Ok(()),
            Some(detail) => Err(CoreError::EngineFailure {
                code: Some(1),
                detail,
            }),
        }
    }

    fn read_artifact(&mut self, name: &str) -> CoreResult<Vec<u8>> {
        self.artifacts.get(name).cloned().ok_or_else(|| {
            CoreError::Artifact(
                name.to_string(),
                io::Error::new(io::ErrorKind::NotFound, "no such artifact"),
            )
        })
    }

    fn delete_artifact(&mut self, name: &str) -> CoreResult<()> {
        self.deleted.push(name.to_string());
        match self.artifacts.remove(name) {
            Some(_) => Ok(()),
            None => Err(CoreError::Artifact(
                name.to_string(),
                io::Error::new(io::ErrorKind::NotFound, "no such artifact"),
            )),
        }
    }
}
