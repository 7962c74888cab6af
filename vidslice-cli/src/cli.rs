//! CLI argument definitions and size-string parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Vidslice: split media into byte-bounded segments or compress to a target size"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence everything but errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split files into segments that each respect a byte-size cap
    Split(SplitArgs),
    /// Re-encode files to hit a target output size
    Compress(CompressArgs),
    /// Probe a file and print its media facts
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
pub struct SplitArgs {
    /// Input media file(s), processed strictly one at a time
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Per-segment byte cap (e.g. 200M, 1.5G, or plain bytes)
    #[arg(short = 's', long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: u64,

    /// Directory segments are written to (defaults to the input's directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Reserve a fixed byte count per segment instead of the fractional
    /// safety margin
    #[arg(long, value_name = "BYTES", value_parser = parse_size)]
    pub fixed_margin: Option<u64>,

    /// Keep segments that exceed the cap instead of re-encoding them
    #[arg(long)]
    pub trust_cap: bool,
}

#[derive(Parser, Debug)]
pub struct CompressArgs {
    /// Input media file(s), processed strictly one at a time
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Target output size (e.g. 25M, 1.5G, or plain bytes)
    #[arg(short = 's', long, value_name = "SIZE", value_parser = parse_size)]
    pub target_size: u64,

    /// Directory outputs are written to (defaults to the input's directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the computed plan as JSON before encoding
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Input media file
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,
}

/// Parses a human-readable size: plain bytes, or a K/M/G suffix in binary
/// units, with an optional fractional part ("200M", "1.5G", "4096").
pub fn parse_size(text: &str) -> Result<u64, String> {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let lower = text.trim().to_ascii_lowercase();
    let (number, multiplier) = if let Some(n) = strip_any(&lower, &["gib", "gb", "g"]) {
        (n, GIB)
    } else if let Some(n) = strip_any(&lower, &["mib", "mb", "m"]) {
        (n, MIB)
    } else if let Some(n) = strip_any(&lower, &["kib", "kb", "k"]) {
        (n, KIB)
    } else {
        (lower.as_str(), 1.0)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{text}'"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid size '{text}'"));
    }
    Ok((value * multiplier) as u64)
}

fn strip_any<'a>(text: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes
        .iter()
        .find_map(|suffix| text.strip_suffix(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_size_plain_bytes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size(" 0 "), Ok(0));
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("200M"), Ok(200 * 1024 * 1024));
        assert_eq!(parse_size("200MiB"), Ok(200 * 1024 * 1024));
        assert_eq!(parse_size("8k"), Ok(8192));
        assert_eq!(parse_size("1G"), Ok(1024 * 1024 * 1024));
        assert_eq!(parse_size("1.5G"), Ok(1_610_612_736));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("many").is_err());
        assert!(parse_size("-5M").is_err());
        assert!(parse_size("M").is_err());
    }
}
