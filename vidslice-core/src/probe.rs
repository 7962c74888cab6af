//! Media probing via zero-output engine invocations.
//!
//! A probe names an input but no output: the engine prints the input facts
//! we want, then exits nonzero complaining that nothing was asked of it.
//! That exit is expected and swallowed; a failure to *start* the engine is
//! not. Probing costs a full invocation, so callers should keep the
//! resulting [`MediaAsset`] around rather than re-probing.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::diagnostics::FactCollector;
use crate::engine::{Engine, Mounted};
use crate::error::{CoreError, CoreResult};
use crate::session::Session;

/// Audio bitrate assumed when the probe finds no audio-stream fact. Audio
/// is non-critical to later planning, so a missing fact is not an error.
pub const FALLBACK_AUDIO_BITRATE: u64 = 128_000;

/// Facts about one input asset, harvested by [`probe_video_info`].
/// Immutable once created; both planners require `duration` and will not
/// run without a successful probe.
#[derive(Debug, Clone, Serialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Duration in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Source audio bitrate in bits per second.
    pub audio_bitrate: u64,
}

/// Probes only the input duration, in seconds.
///
/// Fail-fast by contract: a stream without a `Duration:` line yields
/// [`CoreError::MissingDuration`], never a silent zero.
pub fn probe_duration<E: Engine>(session: &mut Session<E>, source: &Path) -> CoreResult<f64> {
    session.with_mounted(source, |s, input| {
        let facts = run_probe(s, input)?;
        facts
            .duration()
            .ok_or_else(|| CoreError::MissingDuration(display_name(source)))
    })
}

/// Probes duration, resolution, and audio bitrate in one invocation.
pub fn probe_video_info<E: Engine>(
    session: &mut Session<E>,
    source: &Path,
) -> CoreResult<MediaAsset> {
    session.with_mounted(source, |s, input| {
        let facts = run_probe(s, input)?;
        let duration = facts
            .duration()
            .ok_or_else(|| CoreError::MissingDuration(display_name(source)))?;
        let (width, height) = facts
            .resolution()
            .ok_or_else(|| CoreError::MissingResolution(display_name(source)))?;
        let audio_bitrate = facts.audio_bitrate().unwrap_or(FALLBACK_AUDIO_BITRATE);

        Ok(MediaAsset {
            path: source.to_path_buf(),
            size: input.size,
            duration,
            width,
            height,
            audio_bitrate,
        })
    })
}

fn run_probe<E: Engine>(session: &mut Session<E>, input: &Mounted) -> CoreResult<FactCollector> {
    let args = vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.path.display().to_string(),
    ];

    let mut facts = FactCollector::default();
    match session.exec(&args, &mut |line| facts.observe(line)) {
        Ok(()) => {}
        Err(CoreError::EngineFailure { code, .. }) => {
            // A report-only invocation names no output, which the engine
            // treats as a usage error after printing what we came for.
            debug!("probe invocation exited with status {code:?}");
        }
        Err(other) => return Err(other),
    }
    Ok(facts)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
