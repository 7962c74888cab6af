//! Adaptive, byte-bounded segmentation.
//!
//! The loop asks the engine for copy-codec segments of an estimated duration
//! under a hard byte cap, then advances by the duration the engine actually
//! reported through its elapsed-time line. Variable-bitrate sources
//! self-correct this way: when the cap truncates a segment early, the next
//! seek starts where the previous segment really ended, not where the
//! estimate said it would.

use std::fmt;
use std::path::Path;

use log::{debug, warn};

use crate::diagnostics::FactCollector;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::probe::MediaAsset;
use crate::progress::ProgressEvent;
use crate::session::Session;
use crate::utils::source_naming;

/// Fraction of the byte budget assumed reachable when estimating segment
/// duration from the source's average bitrate.
pub const DEFAULT_SIZE_MARGIN: f64 = 0.95;

/// Fraction of the byte budget targeted by the bitrate-capped re-encode
/// after a cap violation.
const REENCODE_QUALITY_MARGIN: f64 = 0.95;

/// Loop end tolerance absorbing clock rounding in the diagnostic stream.
const END_EPSILON: f64 = 0.1;

/// Safety discount applied to the byte budget before estimating segment
/// duration. The fractional policy is the canonical one; the fixed-byte
/// variant subtracts a flat reserve before dividing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeMargin {
    Fraction(f64),
    FixedBytes(u64),
}

impl SizeMargin {
    fn budget(self, max_chunk_bytes: u64) -> f64 {
        match self {
            Self::Fraction(f) => max_chunk_bytes as f64 * f,
            Self::FixedBytes(reserve) => max_chunk_bytes.saturating_sub(reserve).max(1) as f64,
        }
    }
}

impl Default for SizeMargin {
    fn default() -> Self {
        Self::Fraction(DEFAULT_SIZE_MARGIN)
    }
}

/// What to do when a finished segment still exceeds the hard cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Redo the span with a bitrate ceiling sized to the budget (canonical).
    #[default]
    Reencode,
    /// Keep the segment as written; the cap flag is trusted as-is.
    TrustCap,
}

/// Options for [`plan_segments`].
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Hard per-segment byte cap.
    pub max_chunk_bytes: u64,
    pub margin: SizeMargin,
    pub overflow: OverflowPolicy,
}

impl SplitOptions {
    pub fn new(max_chunk_bytes: u64) -> Self {
        Self {
            max_chunk_bytes,
            margin: SizeMargin::default(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// One output segment. The byte buffer is owned exclusively by the caller;
/// the backing workspace artifact is already gone by the time a `Chunk` is
/// returned.
#[derive(Clone)]
pub struct Chunk {
    pub name: String,
    pub data: Vec<u8>,
    /// Source time offset this segment starts at, in seconds.
    pub start: f64,
    /// Source time span this segment covers, in seconds.
    pub duration: f64,
}

impl Chunk {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .field("start", &self.start)
            .field("duration", &self.duration)
            .finish()
    }
}

/// Splits `asset` into byte-bounded segments.
///
/// Emits one progress event per iteration and a final 100% event even when
/// the loop produces nothing; whether a zero-segment outcome means "file
/// already small enough" is the caller's decision, not this loop's. On an
/// engine failure the error carries every segment completed so far.
pub fn plan_segments<E: Engine>(
    session: &mut Session<E>,
    asset: &MediaAsset,
    options: &SplitOptions,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> CoreResult<Vec<Chunk>> {
    session.with_mounted(&asset.path, |s, input| {
        split_loop(s, &input.path, asset, options, on_progress)
    })
}

/// Estimated segment duration (seconds) and total segment count, from the
/// source's average bitrate and the discounted byte budget.
pub(crate) fn estimate(asset: &MediaAsset, options: &SplitOptions) -> (f64, usize) {
    let avg_bitrate = asset.size as f64 / asset.duration; // bytes/sec
    let est_duration = options.margin.budget(options.max_chunk_bytes) / avg_bitrate;
    let est_total = (asset.duration / est_duration).ceil() as usize;
    (est_duration, est_total.max(1))
}

fn split_loop<E: Engine>(
    session: &mut Session<E>,
    input: &Path,
    asset: &MediaAsset,
    options: &SplitOptions,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> CoreResult<Vec<Chunk>> {
    let (est_duration, mut est_total) = estimate(asset, options);
    debug!("segmentation estimate: {est_duration:.2}s per segment, ~{est_total} total");

    let (stem, ext) = source_naming(&asset.path);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = 0.0_f64;

    while current < asset.duration - END_EPSILON {
        let index = chunks.len();
        // The estimate is only a label; once the loop overtakes it, grow it.
        est_total = est_total.max(index + 1);

        let percent = ((current / asset.duration) * 100.0).round() as u8;
        on_progress(ProgressEvent::new(
            percent,
            format!("Writing segment {} of ~{est_total}", index + 1),
        ));

        let name = format!("{stem}.part{index:03}.{ext}");
        match write_segment(session, input, options, current, est_duration, &name) {
            Ok((data, covered)) => {
                debug!(
                    "segment '{name}': {} bytes covering {covered:.2}s from {current:.2}s",
                    data.len()
                );
                chunks.push(Chunk {
                    name,
                    data,
                    start: current,
                    duration: covered,
                });
                current += covered;
            }
            Err(source) => {
                return Err(CoreError::SegmentationAborted {
                    completed: chunks,
                    source: Box::new(source),
                });
            }
        }
    }

    on_progress(ProgressEvent::new(100, "Segmentation complete"));
    Ok(chunks)
}

/// Produces one segment artifact, extracts it, and returns the bytes plus
/// the source time span actually covered.
fn write_segment<E: Engine>(
    session: &mut Session<E>,
    input: &Path,
    options: &SplitOptions,
    start: f64,
    est_duration: f64,
    name: &str,
) -> CoreResult<(Vec<u8>, f64)> {
    let mut facts = FactCollector::default();
    let args = copy_args(input, start, est_duration, options.max_chunk_bytes, name);
    session.exec(&args, &mut |line| facts.observe(line))?;

    let data = session.read_artifact(name)?;
    // At most one segment artifact exists in the workspace at a time.
    session.discard_artifact(name);

    // Advance by what the engine says it wrote; without an elapsed fact the
    // estimate stands in (and keeps the loop strictly advancing).
    let covered = facts
        .elapsed()
        .filter(|&t| t > 0.0)
        .unwrap_or(est_duration);

    if data.len() as u64 > options.max_chunk_bytes && options.overflow == OverflowPolicy::Reencode
    {
        let ceiling = ((options.max_chunk_bytes as f64 * REENCODE_QUALITY_MARGIN * 8.0)
            / covered)
            .floor() as u64;
        warn!(
            "segment '{name}' came out at {} bytes, over the {} cap; redoing with a {ceiling} b/s ceiling",
            data.len(),
            options.max_chunk_bytes
        );

        let mut retry_facts = FactCollector::default();
        let args = reencode_args(
            input,
            start,
            covered,
            options.max_chunk_bytes,
            ceiling,
            name,
        );
        session.exec(&args, &mut |line| retry_facts.observe(line))?;

        let redone = session.read_artifact(name)?;
        session.discard_artifact(name);

        let covered = retry_facts
            .elapsed()
            .filter(|&t| t > 0.0)
            .unwrap_or(covered);
        return Ok((redone, covered));
    }

    Ok((data, covered))
}

/// Copy-codec segment extraction: seek, bounded duration, hard byte cap.
fn copy_args(input: &Path, start: f64, duration: f64, cap: u64, name: &str) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format!("{start:.3}"),
        "-i".to_string(),
        input.display().to_string(),
        "-t".to_string(),
        format!("{duration:.3}"),
        "-fs".to_string(),
        cap.to_string(),
        "-c".to_string(),
        "copy".to_string(),
        name.to_string(),
    ]
}

/// Cap-violation fallback: same span, same hard cap, but with a bitrate
/// ceiling instead of stream copy.
fn reencode_args(
    input: &Path,
    start: f64,
    duration: f64,
    cap: u64,
    ceiling: u64,
    name: &str,
) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format!("{start:.3}"),
        "-i".to_string(),
        input.display().to_string(),
        "-t".to_string(),
        format!("{duration:.3}"),
        "-fs".to_string(),
        cap.to_string(),
        "-b:v".to_string(),
        ceiling.to_string(),
        "-maxrate".to_string(),
        ceiling.to_string(),
        "-bufsize".to_string(),
        (ceiling * 2).to_string(),
        name.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{InvocationScript, ScriptedEngine};
    use std::path::PathBuf;

    const MIB: u64 = 1024 * 1024;

    fn asset(size: u64, duration: f64) -> MediaAsset {
        MediaAsset {
            path: PathBuf::from("movie.mp4"),
            size,
            duration,
            width: 1920,
            height: 1080,
            audio_bitrate: 128_000,
        }
    }

    fn stats_line(clock: &str) -> String {
        format!("frame=  240 fps= 60 q=-1.0 size=  10240KiB time={clock} bitrate=1000.0kbits/s speed=30x")
    }

    #[test]
    fn test_estimate_matches_average_bitrate_math() {
        // 1 GB over 600s against a 200 MiB cap with the canonical 0.95
        // fractional margin.
        let asset = asset(1_000_000_000, 600.0);
        let options = SplitOptions::new(209_715_200);
        let (est_duration, est_total) = estimate(&asset, &options);
        assert!((est_duration - 119.54).abs() < 0.01, "got {est_duration}");
        assert_eq!(est_total, 6);
    }

    #[test]
    fn test_fixed_byte_margin_policy() {
        let asset = asset(1_000_000, 100.0); // 10_000 bytes/sec
        let mut options = SplitOptions::new(100_000);
        options.margin = SizeMargin::FixedBytes(20_000);
        let (est_duration, _) = estimate(&asset, &options);
        assert!((est_duration - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_loop_advances_by_reported_elapsed_time() {
        // 100s asset, estimate asks for ~47.5s segments, but the engine
        // reports only 40s written each time: the seeks land at 0/40/80,
        // not at the estimate's 0/47.5/95.
        let mut engine = ScriptedEngine::new(10_000_000);
        for i in 0..3 {
            engine.expect(
                InvocationScript::ok(&[&stats_line("00:00:40.00")])
                    .with_artifact(&format!("movie.part{i:03}.mp4"), vec![0u8; 1000]),
            );
        }
        let mut session = Session::new(engine);

        let asset = asset(10_000_000, 100.0);
        let options = SplitOptions::new(5_000_000);
        let mut events = Vec::new();
        let chunks =
            plan_segments(&mut session, &asset, &options, &mut |e| events.push(e)).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start, 0.0);
        assert_eq!(chunks[1].start, 40.0);
        assert_eq!(chunks[2].start, 80.0);
        // Strictly increasing starts.
        assert!(chunks.windows(2).all(|w| w[1].start > w[0].start));

        // The estimate said 3 segments ((100/47.5).ceil()); the loop stayed
        // within it, and the final event is the 100% "done".
        assert_eq!(events.last().unwrap().percent, 100);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_loop_falls_back_to_estimate_without_elapsed_fact() {
        let mut engine = ScriptedEngine::new(10_000_000);
        for i in 0..3 {
            engine.expect(
                InvocationScript::ok(&["no progress lines at all"])
                    .with_artifact(&format!("movie.part{i:03}.mp4"), vec![0u8; 1000]),
            );
        }
        let mut session = Session::new(engine);

        let asset = asset(10_000_000, 100.0);
        let options = SplitOptions::new(5_000_000); // estimate: 47.5s
        let chunks = plan_segments(&mut session, &asset, &options, &mut |_| {}).unwrap();

        assert_eq!(chunks.len(), 3);
        assert!((chunks[1].start - 47.5).abs() < 1e-9);
    }

    #[test]
    fn test_cap_violation_triggers_bitrate_capped_redo() {
        let mut engine = ScriptedEngine::new(2 * MIB);
        // First attempt exceeds the 1 MiB cap; the redo fits.
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00")])
                .with_artifact("movie.part000.mp4", vec![0u8; (MIB + 50_000) as usize]),
        );
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00")])
                .with_artifact("movie.part000.mp4", vec![1u8; 800_000]),
        );
        let mut session = Session::new(engine);

        let asset = asset(MIB, 60.0); // one-segment run
        let options = SplitOptions::new(MIB);
        let chunks = plan_segments(&mut session, &asset, &options, &mut |_| {}).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data[0], 1u8); // the redo's bytes won
        assert_eq!(chunks[0].size(), 800_000);

        let engine = session.into_engine();
        assert_eq!(engine.calls.len(), 2);
        // The redo carries a bitrate ceiling sized to the discounted budget:
        // floor(1 MiB * 0.95 * 8 / 60s).
        let redo = &engine.calls[1];
        let expected_ceiling = ((MIB as f64 * 0.95 * 8.0) / 60.0).floor() as u64;
        assert!(redo.contains(&"-b:v".to_string()));
        assert!(redo.contains(&expected_ceiling.to_string()));
        // Both artifacts were discarded after extraction.
        assert!(engine.artifact_names().is_empty());
        assert_eq!(engine.deleted.len(), 2);
    }

    #[test]
    fn test_trust_cap_policy_keeps_oversized_segment() {
        let mut engine = ScriptedEngine::new(2 * MIB);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00")])
                .with_artifact("movie.part000.mp4", vec![0u8; (MIB + 50_000) as usize]),
        );
        let mut session = Session::new(engine);

        let asset = asset(MIB, 60.0);
        let mut options = SplitOptions::new(MIB);
        options.overflow = OverflowPolicy::TrustCap;
        let chunks = plan_segments(&mut session, &asset, &options, &mut |_| {}).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].size(), MIB + 50_000);
        assert_eq!(session.into_engine().calls.len(), 1);
    }

    #[test]
    fn test_engine_failure_surfaces_completed_segments() {
        let mut engine = ScriptedEngine::new(10_000_000);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:00:40.00")])
                .with_artifact("movie.part000.mp4", vec![0u8; 1000]),
        );
        engine.expect(InvocationScript::failing(&[], "Invalid data found"));
        let mut session = Session::new(engine);

        let asset = asset(10_000_000, 100.0);
        let options = SplitOptions::new(5_000_000);
        let err = plan_segments(&mut session, &asset, &options, &mut |_| {}).unwrap_err();

        match err {
            CoreError::SegmentationAborted { completed, source } => {
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].name, "movie.part000.mp4");
                assert!(matches!(*source, CoreError::EngineFailure { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failed run still unmounted the workspace.
        assert_eq!(session.into_engine().unmounts, 1);
    }

    #[test]
    fn test_zero_iterations_still_emit_done_event() {
        // Terminal condition holds immediately; no invocation is scripted,
        // so any engine call would panic.
        let mut session = Session::new(ScriptedEngine::new(1000));
        let asset = asset(1000, 0.05);
        let options = SplitOptions::new(5_000_000);

        let mut events = Vec::new();
        let chunks =
            plan_segments(&mut session, &asset, &options, &mut |e| events.push(e)).unwrap();
        assert!(chunks.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].percent, 100);
    }

    #[test]
    fn test_copy_invocation_shape() {
        let mut engine = ScriptedEngine::new(MIB);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00")])
                .with_artifact("movie.part000.mp4", vec![0u8; 100]),
        );
        let mut session = Session::new(engine);

        let asset = asset(MIB, 60.0);
        let options = SplitOptions::new(MIB);
        plan_segments(&mut session, &asset, &options, &mut |_| {}).unwrap();

        let calls = session.into_engine().calls;
        let args = &calls[0];
        assert_eq!(args[0], "-hide_banner");
        assert!(args.contains(&"-fs".to_string()));
        assert!(args.contains(&MIB.to_string()));
        assert!(args.contains(&"copy".to_string()));
        assert_eq!(args.last().unwrap(), "movie.part000.mp4");
    }
}
