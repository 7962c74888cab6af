//! Implementation of the 'compress' subcommand.
//!
//! Probes each input, computes the bitrate/resolution plan for the target
//! size (always reporting the quality floor alongside it), then drives the
//! two-pass encode and writes the result.

use std::fs;
use std::path::Path;

use anyhow::Context;
use console::style;
use log::info;

use vidslice_core::{
    CompressionPlan, Session, SubprocessEngine, execute_compression, format_bytes,
    plan_compression, probe_video_info, utils::source_naming,
};

use crate::cli::CompressArgs;
use crate::commands::{for_each_input, resolve_output_dir};
use crate::render::ProgressRender;

pub fn run(args: &CompressArgs) -> anyhow::Result<usize> {
    let engine = SubprocessEngine::new().context("failed to create engine workspace")?;
    let mut session = Session::new(engine);

    Ok(for_each_input(&args.inputs, |input| {
        compress_one(&mut session, input, args)
    }))
}

fn compress_one(
    session: &mut Session<SubprocessEngine>,
    input: &Path,
    args: &CompressArgs,
) -> anyhow::Result<()> {
    let asset = probe_video_info(session, input)?;
    let plan = plan_compression(
        asset.size,
        asset.duration,
        asset.width,
        asset.height,
        args.target_size,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    describe_plan(input, &plan);

    let out_dir = resolve_output_dir(args.output_dir.as_deref(), input);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory '{}'", out_dir.display()))?;
    let (stem, _) = source_naming(input);
    let out_path = out_dir.join(format!("{stem}.compressed.mp4"));

    let bar = ProgressRender::new("compress");
    let result = execute_compression(session, &asset, &plan, &mut |e| bar.update(e));
    bar.finish();
    let data = result?;

    let actual = data.len() as u64;
    fs::write(&out_path, &data)
        .with_context(|| format!("failed to write '{}'", out_path.display()))?;
    info!("wrote {} ({})", out_path.display(), format_bytes(actual));
    println!(
        "{}: wrote {} ({}, target was {})",
        input.display(),
        out_path.display(),
        format_bytes(actual),
        format_bytes(args.target_size)
    );
    Ok(())
}

fn describe_plan(input: &Path, plan: &CompressionPlan) {
    println!(
        "{}: plan {}x{} video at {} b/s, audio at {} b/s",
        input.display(),
        plan.width,
        plan.height,
        plan.video_bitrate,
        plan.audio_bitrate
    );
    println!(
        "  {} {}x{} at {} b/s",
        style("quality floor:").dim(),
        plan.floor.width,
        plan.floor.height,
        plan.floor.video_bitrate
    );
}
