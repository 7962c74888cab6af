//! Size-targeted compression planning.
//!
//! Pure arithmetic: no engine, no I/O, no hidden state. Identical inputs
//! always yield an identical plan; the two-pass orchestrator realizes it.

use log::debug;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// Audio bitrate reserved off the top of every size target, bits/sec.
pub const AUDIO_BITRATE: u64 = 96_000;

/// Quality heuristic: minimum bits per pixel per second before the planner
/// steps the resolution down.
pub const MIN_BITS_PER_PIXEL: f64 = 0.04;

/// Descending heights the planner may downscale to. The lowest rung is the
/// quality floor: it is used even when its bpp still falls short.
const RESOLUTION_LADDER: [u32; 6] = [1080, 720, 480, 360, 240, 144];

/// The lowest-rung report attached to every plan for caller display,
/// regardless of which resolution the plan itself chose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityFloor {
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u64,
}

/// A bitrate/resolution plan for a byte target. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressionPlan {
    /// Target video bitrate, bits/sec.
    pub video_bitrate: u64,
    /// Target audio bitrate, bits/sec.
    pub audio_bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub floor: QualityFloor,
}

/// Computes the plan that spends `target_bytes` on `duration` seconds of
/// video at the best resolution the bpp heuristic allows.
///
/// Ladder rules: strictly descending, rungs at or above the source height
/// are skipped, the first rung satisfying [`MIN_BITS_PER_PIXEL`] wins, and
/// when none does the lowest rung is used anyway; the quality floor beats
/// strict bpp satisfaction.
pub fn plan_compression(
    file_size: u64,
    duration: f64,
    width: u32,
    height: u32,
    target_bytes: u64,
) -> CoreResult<CompressionPlan> {
    let available_video_bits = target_bytes as f64 * 8.0 - AUDIO_BITRATE as f64 * duration;
    if available_video_bits <= 0.0 {
        return Err(CoreError::TargetTooSmall {
            target_bytes,
            duration,
        });
    }

    let video_bitrate = (available_video_bits / duration).floor() as u64;
    debug!(
        "size target {target_bytes} bytes ({:.1}% of source) leaves {video_bitrate} b/s for video",
        target_bytes as f64 / file_size.max(1) as f64 * 100.0
    );

    let floor = {
        let (w, h) = floor_dimensions(width, height);
        QualityFloor {
            width: w,
            height: h,
            video_bitrate,
        }
    };

    let (out_width, out_height) = if bits_per_pixel(video_bitrate, width, height)
        >= MIN_BITS_PER_PIXEL
    {
        (width, height)
    } else {
        descend_ladder(video_bitrate, width, height)
    };

    Ok(CompressionPlan {
        video_bitrate,
        audio_bitrate: AUDIO_BITRATE,
        width: out_width,
        height: out_height,
        floor,
    })
}

fn bits_per_pixel(bitrate: u64, width: u32, height: u32) -> f64 {
    bitrate as f64 / (f64::from(width) * f64::from(height))
}

/// Aspect-preserving width for a target height, rounded to the nearest even
/// pixel count (encoders reject odd dimensions).
fn even_scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    let scaled = f64::from(width) * f64::from(target_height) / f64::from(height);
    ((scaled / 2.0).round() as u32) * 2
}

fn descend_ladder(bitrate: u64, width: u32, height: u32) -> (u32, u32) {
    for &rung in &RESOLUTION_LADDER {
        if rung >= height {
            continue;
        }
        let rung_width = even_scaled_width(width, height, rung);
        if bits_per_pixel(bitrate, rung_width, rung) >= MIN_BITS_PER_PIXEL {
            return (rung_width, rung);
        }
    }
    floor_dimensions(width, height)
}

fn floor_dimensions(width: u32, height: u32) -> (u32, u32) {
    let rung = RESOLUTION_LADDER[RESOLUTION_LADDER.len() - 1];
    if height <= rung {
        (width, height)
    } else {
        (even_scaled_width(width, height, rung), rung)
    }
}
