//! Implementation of the 'info' subcommand.

use anyhow::Context;

use vidslice_core::{Session, SubprocessEngine, format_bytes, format_duration, probe_video_info};

use crate::cli::InfoArgs;

pub fn run(args: &InfoArgs) -> anyhow::Result<usize> {
    let engine = SubprocessEngine::new().context("failed to create engine workspace")?;
    let mut session = Session::new(engine);

    let asset = probe_video_info(&mut session, &args.input)?;
    println!("{}", args.input.display());
    println!("  size:          {}", format_bytes(asset.size));
    println!("  duration:      {}", format_duration(asset.duration));
    println!("  resolution:    {}x{}", asset.width, asset.height);
    println!("  audio bitrate: {} b/s", asset.audio_bitrate);
    Ok(0)
}
