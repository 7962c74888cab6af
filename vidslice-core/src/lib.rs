//! Core library for byte-bounded media segmentation and size-targeted
//! encoding, driving an external transcoding engine through its textual
//! diagnostic stream.
//!
//! This crate provides media probing, an adaptive chunk planner that splits
//! a stream into byte-capped segments using feedback from the engine's own
//! progress output, a pure compression planner that hits a target output
//! size while respecting a quality floor, and a two-pass encode orchestrator
//! that realizes such a plan.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vidslice_core::{Session, SplitOptions, SubprocessEngine};
//!
//! let engine = SubprocessEngine::new().unwrap();
//! let mut session = Session::new(engine);
//!
//! let asset = vidslice_core::probe_video_info(&mut session, Path::new("input.mp4")).unwrap();
//! let options = SplitOptions::new(200 * 1024 * 1024);
//! let chunks = vidslice_core::plan_segments(&mut session, &asset, &options, &mut |event| {
//!     eprintln!("[{:>3}%] {}", event.percent, event.message);
//! })
//! .unwrap();
//!
//! for chunk in &chunks {
//!     std::fs::write(&chunk.name, &chunk.data).unwrap();
//! }
//! ```

pub mod chunker;
pub mod compression;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod probe;
pub mod progress;
pub mod session;
pub mod twopass;
pub mod utils;

// Re-exports for public API
pub use chunker::{Chunk, OverflowPolicy, SizeMargin, SplitOptions, plan_segments};
pub use compression::{
    AUDIO_BITRATE, CompressionPlan, MIN_BITS_PER_PIXEL, QualityFloor, plan_compression,
};
pub use diagnostics::{DiagnosticFact, FactCollector, parse_clock};
pub use engine::{Engine, Mounted, SubprocessEngine};
pub use error::{CoreError, CoreResult};
pub use probe::{FALLBACK_AUDIO_BITRATE, MediaAsset, probe_duration, probe_video_info};
pub use progress::ProgressEvent;
pub use session::Session;
pub use twopass::execute_compression;
pub use utils::{format_bytes, format_duration};

#[cfg(any(test, feature = "test-mocks"))]
pub use engine::{InvocationScript, ScriptedEngine};
