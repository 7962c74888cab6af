//! Engine implementation backed by an `ffmpeg` subprocess.
//!
//! Artifacts live in a private temporary workspace that doubles as the
//! subprocess working directory, so invocations refer to them by bare name.
//! The workspace is removed when the engine is dropped.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use tempfile::{Builder as TempFileBuilder, TempDir};

use super::{Engine, Mounted};
use crate::error::{CoreError, CoreResult};

/// Trailing diagnostic lines retained for failure reports.
const STDERR_TAIL_LINES: usize = 40;

pub struct SubprocessEngine {
    binary: String,
    workspace: TempDir,
    checked: bool,
}

impl SubprocessEngine {
    /// Creates an engine backed by `ffmpeg` from PATH.
    pub fn new() -> CoreResult<Self> {
        Self::with_binary("ffmpeg")
    }

    /// Creates an engine backed by a specific binary.
    pub fn with_binary(binary: &str) -> CoreResult<Self> {
        let workspace = TempFileBuilder::new().prefix("vidslice_").tempdir()?;
        Ok(Self {
            binary: binary.to_string(),
            workspace,
            checked: false,
        })
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.workspace.path().join(name)
    }
}

impl Engine for SubprocessEngine {
    fn ensure_ready(&mut self) -> CoreResult<()> {
        if self.checked {
            return Ok(());
        }

        let status = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(_) => {
                debug!("found engine binary: {}", self.binary);
                self.checked = true;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CoreError::DependencyNotFound(self.binary.clone()))
            }
            Err(e) => Err(CoreError::CommandStart(self.binary.clone(), e)),
        }
    }

    fn mount(&mut self, source: &Path) -> CoreResult<Mounted> {
        let path = source.canonicalize().map_err(|e| {
            CoreError::PathError(format!("cannot resolve '{}': {e}", source.display()))
        })?;
        let size = std::fs::metadata(&path)?.len();
        Ok(Mounted { path, size })
    }

    fn unmount(&mut self) -> CoreResult<()> {
        // Nothing engine-side to release; the mount is a path reference and
        // the singleton bookkeeping lives in the session.
        Ok(())
    }

    fn exec(&mut self, args: &[String], on_line: &mut dyn FnMut(&str)) -> CoreResult<()> {
        self.ensure_ready()?;
        debug!("engine invocation: {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(self.workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::CommandStart(self.binary.clone(), e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("engine stderr was not captured"))?;

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for_each_line(stderr, |line| {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
            on_line(line);
        })?;

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
            Err(CoreError::EngineFailure {
                code: status.code(),
                detail,
            })
        }
    }

    fn read_artifact(&mut self, name: &str) -> CoreResult<Vec<u8>> {
        std::fs::read(self.artifact_path(name)).map_err(|e| CoreError::Artifact(name.to_string(), e))
    }

    fn delete_artifact(&mut self, name: &str) -> CoreResult<()> {
        std::fs::remove_file(self.artifact_path(name))
            .map_err(|e| CoreError::Artifact(name.to_string(), e))
    }
}

/// Feeds `f` every line of `reader`, treating both `\n` and `\r` as
/// terminators; the engine rewrites its progress line in place with bare
/// carriage returns.
fn for_each_line<R: Read>(mut reader: R, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    f(&String::from_utf8_lossy(&pending));
                    pending.clear();
                }
            } else {
                pending.push(byte);
            }
        }
    }

    if !pending.is_empty() {
        f(&String::from_utf8_lossy(&pending));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(input: &[u8]) -> Vec<String> {
        let mut seen = Vec::new();
        for_each_line(input, |l| seen.push(l.to_string())).unwrap();
        seen
    }

    #[test]
    fn test_for_each_line_splits_on_newline_and_carriage_return() {
        let seen = lines_of(b"first\nsecond\rthird\r\nfourth");
        assert_eq!(seen, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_for_each_line_flushes_unterminated_tail() {
        let seen = lines_of(b"time=00:00:01.00");
        assert_eq!(seen, vec!["time=00:00:01.00"]);
    }

    #[test]
    fn test_for_each_line_skips_blank_runs() {
        let seen = lines_of(b"\r\n\r\na\r\r\rb\n");
        assert_eq!(seen, vec!["a", "b"]);
    }
}
