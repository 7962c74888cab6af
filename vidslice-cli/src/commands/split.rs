//! Implementation of the 'split' subcommand.
//!
//! Probes each input, skips anything already within the byte budget, and
//! writes the planner's segments to disk. When segmentation aborts partway,
//! whatever segments were completed are still written before the failure is
//! reported.

use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;

use vidslice_core::{
    Chunk, CoreError, OverflowPolicy, Session, SizeMargin, SplitOptions, SubprocessEngine,
    format_bytes, format_duration, plan_segments, probe_video_info,
};

use crate::cli::SplitArgs;
use crate::commands::{for_each_input, resolve_output_dir};
use crate::render::ProgressRender;

pub fn run(args: &SplitArgs) -> anyhow::Result<usize> {
    let engine = SubprocessEngine::new().context("failed to create engine workspace")?;
    let mut session = Session::new(engine);

    let mut options = SplitOptions::new(args.max_size);
    if let Some(reserve) = args.fixed_margin {
        options.margin = SizeMargin::FixedBytes(reserve);
    }
    if args.trust_cap {
        options.overflow = OverflowPolicy::TrustCap;
    }

    Ok(for_each_input(&args.inputs, |input| {
        split_one(&mut session, input, args, &options)
    }))
}

fn split_one(
    session: &mut Session<SubprocessEngine>,
    input: &Path,
    args: &SplitArgs,
    options: &SplitOptions,
) -> anyhow::Result<()> {
    let asset = probe_video_info(session, input)?;
    info!(
        "{}: {} over {}, {}x{}",
        input.display(),
        format_bytes(asset.size),
        format_duration(asset.duration),
        asset.width,
        asset.height
    );

    // Whether a small file needs splitting at all is this caller's call,
    // not the planner's: skip it here.
    if asset.size <= options.max_chunk_bytes {
        println!(
            "{}: already within {}, nothing to split",
            input.display(),
            format_bytes(options.max_chunk_bytes)
        );
        return Ok(());
    }

    let out_dir = resolve_output_dir(args.output_dir.as_deref(), input);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory '{}'", out_dir.display()))?;

    let bar = ProgressRender::new("split");
    let result = plan_segments(session, &asset, options, &mut |e| bar.update(e));
    bar.finish();

    match result {
        Ok(chunks) => {
            write_chunks(&out_dir, &chunks)?;
            println!(
                "{}: {} segment(s), {} total",
                input.display(),
                chunks.len(),
                format_bytes(chunks.iter().map(Chunk::size).sum())
            );
            Ok(())
        }
        Err(CoreError::SegmentationAborted { completed, source }) => {
            // Salvage what the loop finished before the failure.
            let salvaged = completed.len();
            write_chunks(&out_dir, &completed)?;
            Err(anyhow::Error::from(*source)).with_context(|| {
                format!("segmentation aborted; {salvaged} completed segment(s) were kept")
            })
        }
        Err(other) => Err(other.into()),
    }
}

fn write_chunks(dir: &Path, chunks: &[Chunk]) -> anyhow::Result<()> {
    for chunk in chunks {
        let path = dir.join(&chunk.name);
        fs::write(&path, &chunk.data)
            .with_context(|| format!("failed to write segment '{}'", path.display()))?;
        info!("wrote {} ({})", path.display(), format_bytes(chunk.size()));
    }
    Ok(())
}
