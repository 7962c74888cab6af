//! Subcommand implementations.

pub mod compress;
pub mod info;
pub mod split;

use std::path::{Path, PathBuf};

use console::style;

/// Runs `op` over each input strictly in order, because the engine workspace is a
/// singleton, so assets are never processed concurrently. One input's
/// failure is reported and does not block the rest.
///
/// Returns the number of inputs that failed.
pub fn for_each_input(
    inputs: &[PathBuf],
    mut op: impl FnMut(&Path) -> anyhow::Result<()>,
) -> usize {
    let mut failures = 0;
    for input in inputs {
        if let Err(e) = op(input) {
            failures += 1;
            eprintln!(
                "{} {}: {e:#}",
                style("failed:").red().bold(),
                input.display()
            );
        }
    }
    failures
}

/// Output directory for an input: the explicit choice, else the input's own
/// directory.
pub fn resolve_output_dir(explicit: Option<&Path>, input: &Path) -> PathBuf {
    match explicit {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}
