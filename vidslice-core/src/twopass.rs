//! Two-pass encode orchestration.
//!
//! Realizes a [`CompressionPlan`] with two sequential invocations: an
//! analysis pass that writes rate-control statistics and discards its
//! output, then the final pass that consumes those statistics and produces
//! the named artifact. Progress is scaled into [0,45] for the first pass and
//! [50,95] for the second, with a single 100% emission once the output has
//! been extracted.
//!
//! There is no retry and no plan adjustment here. A caller unhappy with a
//! failed or oversized result re-plans with a smaller target explicitly.

use std::path::Path;

use crate::compression::CompressionPlan;
use crate::diagnostics::FactCollector;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::probe::MediaAsset;
use crate::progress::ProgressEvent;
use crate::session::Session;

/// Stem of the rate-control statistics log shared between the passes.
const PASS_LOG_STEM: &str = "vidslice2p";

/// Name of the final output artifact.
const OUTPUT_ARTIFACT: &str = "compressed.mp4";

/// Null sink for the analysis pass output.
const NULL_SINK: &str = "-";

/// Encodes `asset` per `plan` and returns the output bytes.
///
/// Fails with [`CoreError::EncodeFailed`] naming the pass that broke.
/// Workspace hygiene (output artifact, statistics logs) runs on success and
/// failure alike and never masks the primary outcome.
pub fn execute_compression<E: Engine>(
    session: &mut Session<E>,
    asset: &MediaAsset,
    plan: &CompressionPlan,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> CoreResult<Vec<u8>> {
    session.with_mounted(&asset.path, |s, input| {
        let result = run_passes(s, &input.path, asset, plan, on_progress);
        for name in pass_log_artifacts() {
            s.discard_artifact(&name);
        }
        if result.is_err() {
            s.discard_artifact(OUTPUT_ARTIFACT);
        }
        result
    })
}

fn run_passes<E: Engine>(
    session: &mut Session<E>,
    input: &Path,
    asset: &MediaAsset,
    plan: &CompressionPlan,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> CoreResult<Vec<u8>> {
    let scale = (plan.width != asset.width || plan.height != asset.height)
        .then(|| format!("scale={}:{}", plan.width, plan.height));

    run_pass(
        session,
        &pass1_args(input, plan, scale.as_deref()),
        asset.duration,
        0.0,
        "Analyzing",
        on_progress,
    )
    .map_err(|e| CoreError::EncodeFailed {
        pass: 1,
        source: Box::new(e),
    })?;

    run_pass(
        session,
        &pass2_args(input, plan, scale.as_deref()),
        asset.duration,
        50.0,
        "Encoding",
        on_progress,
    )
    .map_err(|e| CoreError::EncodeFailed {
        pass: 2,
        source: Box::new(e),
    })?;

    let data = session.read_artifact(OUTPUT_ARTIFACT)?;
    session.discard_artifact(OUTPUT_ARTIFACT);

    on_progress(ProgressEvent::new(100, "Compression complete"));
    Ok(data)
}

/// Runs one pass, mapping the engine's elapsed time into a 45-point span
/// starting at `base`.
fn run_pass<E: Engine>(
    session: &mut Session<E>,
    args: &[String],
    duration: f64,
    base: f64,
    label: &str,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> CoreResult<()> {
    let mut facts = FactCollector::default();
    let mut last_emitted: i16 = -1;

    session.exec(args, &mut |line| {
        facts.observe(line);
        if let Some(elapsed) = facts.elapsed() {
            let fraction = if duration > 0.0 {
                (elapsed / duration).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let percent = (base + fraction * 45.0).round() as i16;
            if percent != last_emitted {
                last_emitted = percent;
                on_progress(ProgressEvent::new(percent as u8, label));
            }
        }
    })
}

/// Analysis pass: video only, statistics out, output discarded.
fn pass1_args(input: &Path, plan: &CompressionPlan, scale: Option<&str>) -> Vec<String> {
    let mut args = common_head(input, plan, scale);
    args.extend([
        "-pass".to_string(),
        "1".to_string(),
        "-passlogfile".to_string(),
        PASS_LOG_STEM.to_string(),
        "-an".to_string(),
        "-f".to_string(),
        "null".to_string(),
        NULL_SINK.to_string(),
    ]);
    args
}

/// Final pass: same video settings plus audio at the planned bitrate.
fn pass2_args(input: &Path, plan: &CompressionPlan, scale: Option<&str>) -> Vec<String> {
    let mut args = common_head(input, plan, scale);
    args.extend([
        "-pass".to_string(),
        "2".to_string(),
        "-passlogfile".to_string(),
        PASS_LOG_STEM.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        plan.audio_bitrate.to_string(),
        OUTPUT_ARTIFACT.to_string(),
    ]);
    args
}

fn common_head(input: &Path, plan: &CompressionPlan, scale: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-b:v".to_string(),
        plan.video_bitrate.to_string(),
    ];
    if let Some(filter) = scale {
        args.extend(["-vf".to_string(), filter.to_string()]);
    }
    args
}

fn pass_log_artifacts() -> [String; 2] {
    [
        format!("{PASS_LOG_STEM}-0.log"),
        format!("{PASS_LOG_STEM}-0.log.mbtree"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{InvocationScript, ScriptedEngine};
    use std::path::PathBuf;

    fn asset() -> MediaAsset {
        MediaAsset {
            path: PathBuf::from("movie.mp4"),
            size: 100_000_000,
            duration: 120.0,
            width: 1920,
            height: 1080,
            audio_bitrate: 128_000,
        }
    }

    fn plan(width: u32, height: u32) -> CompressionPlan {
        CompressionPlan {
            video_bitrate: 1_570_666,
            audio_bitrate: 96_000,
            width,
            height,
            floor: crate::compression::QualityFloor {
                width: 256,
                height: 144,
                video_bitrate: 1_570_666,
            },
        }
    }

    fn stats_line(clock: &str) -> String {
        format!("frame= 1200 fps=120 q=28.0 size=  8192KiB time={clock} bitrate=1500.0kbits/s speed=12x")
    }

    #[test]
    fn test_both_passes_run_and_output_is_extracted() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:02:00.00")])
                .with_artifact("vidslice2p-0.log", b"stats".to_vec())
                .with_artifact("vidslice2p-0.log.mbtree", b"tree".to_vec()),
        );
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:02:00.00")])
                .with_artifact("compressed.mp4", vec![7u8; 24_000_000]),
        );
        let mut session = Session::new(engine);

        let mut events = Vec::new();
        let data = execute_compression(&mut session, &asset(), &plan(1920, 1080), &mut |e| {
            events.push(e)
        })
        .unwrap();
        assert_eq!(data.len(), 24_000_000);
        assert_eq!(events.last().unwrap().percent, 100);

        let engine = session.into_engine();
        assert_eq!(engine.calls.len(), 2);
        assert!(engine.calls[0].contains(&"-an".to_string()));
        assert!(engine.calls[0].contains(&"1".to_string()));
        assert!(engine.calls[1].contains(&"aac".to_string()));
        assert_eq!(engine.calls[1].last().unwrap(), "compressed.mp4");
        // Output and statistics logs are all gone.
        assert!(engine.artifact_names().is_empty());
        assert_eq!(engine.unmounts, 1);
    }

    #[test]
    fn test_progress_spans_per_pass() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00"), &stats_line("00:02:00.00")])
                .with_artifact("vidslice2p-0.log", b"stats".to_vec()),
        );
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:01:00.00"), &stats_line("00:02:00.00")])
                .with_artifact("compressed.mp4", vec![7u8; 100]),
        );
        let mut session = Session::new(engine);

        let mut percents = Vec::new();
        execute_compression(&mut session, &asset(), &plan(1920, 1080), &mut |e| {
            percents.push(e.percent)
        })
        .unwrap();

        // Pass 1 maps into [0,45], pass 2 into [50,95], then the final 100.
        assert_eq!(percents, vec![23, 45, 73, 95, 100]);
    }

    #[test]
    fn test_downscale_plan_adds_scale_filter() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(InvocationScript::ok(&[&stats_line("00:02:00.00")]));
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:02:00.00")])
                .with_artifact("compressed.mp4", vec![7u8; 100]),
        );
        let mut session = Session::new(engine);

        execute_compression(&mut session, &asset(), &plan(1280, 720), &mut |_| {}).unwrap();

        let engine = session.into_engine();
        for call in &engine.calls {
            assert!(call.contains(&"scale=1280:720".to_string()));
        }
    }

    #[test]
    fn test_source_resolution_plan_has_no_filter() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(InvocationScript::ok(&[&stats_line("00:02:00.00")]));
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:02:00.00")])
                .with_artifact("compressed.mp4", vec![7u8; 100]),
        );
        let mut session = Session::new(engine);

        execute_compression(&mut session, &asset(), &plan(1920, 1080), &mut |_| {}).unwrap();

        let engine = session.into_engine();
        assert!(!engine.calls[0].contains(&"-vf".to_string()));
    }

    #[test]
    fn test_pass1_failure_is_wrapped_and_cleaned_up() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(
            InvocationScript::failing(&[], "Unknown encoder 'libx264'")
                .with_artifact("vidslice2p-0.log", b"partial".to_vec()),
        );
        let mut session = Session::new(engine);

        let err = execute_compression(&mut session, &asset(), &plan(1920, 1080), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, CoreError::EncodeFailed { pass: 1, .. }));

        let engine = session.into_engine();
        assert_eq!(engine.calls.len(), 1); // pass 2 never ran
        assert!(engine.artifact_names().is_empty()); // logs swept
        assert_eq!(engine.unmounts, 1);
    }

    #[test]
    fn test_pass2_failure_is_wrapped() {
        let mut engine = ScriptedEngine::new(100_000_000);
        engine.expect(
            InvocationScript::ok(&[&stats_line("00:02:00.00")])
                .with_artifact("vidslice2p-0.log", b"stats".to_vec()),
        );
        engine.expect(InvocationScript::failing(&[], "No space left on device"));
        let mut session = Session::new(engine);

        let err = execute_compression(&mut session, &asset(), &plan(1920, 1080), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, CoreError::EncodeFailed { pass: 2, .. }));
        assert!(session.into_engine().artifact_names().is_empty());
    }
}
